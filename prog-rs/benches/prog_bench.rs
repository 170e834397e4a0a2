use criterion::{black_box, criterion_group, criterion_main, Criterion};
use prog::{Prog, ProgDefinition, ProgVariableType, StandardCompiler, Value};

const SIEVE: &str = "
var primes as number collection
for (n : @limit)
    if (@n < 2)
        continue
    end if
    var prime as boolean = true
    foreach (p in @primes)
        if (@p * @p > @n)
            break
        end if
        if (@n % @p == 0)
            prime = false
            break
        end if
    end foreach
    if (@prime)
        additem primes @n
    end if
end for
return count(@primes)";

fn definition() -> ProgDefinition {
    ProgDefinition::new("sieve", ProgVariableType::NUMBER, SIEVE)
        .with_parameter("limit", ProgVariableType::NUMBER)
}

fn bench_compile(c: &mut Criterion) {
    let def = definition();
    let compiler = StandardCompiler::new();
    c.bench_function("compile_sieve", |b| {
        b.iter(|| Prog::compile(black_box(&def), &compiler))
    });
}

fn bench_execute(c: &mut Criterion) {
    let prog = match Prog::compile_standard(&definition()) {
        Ok(p) => p,
        Err(e) => panic!("sieve does not compile: {e}"),
    };

    let mut g = c.benchmark_group("execute_sieve");
    for limit in [100.0, 1_000.0, 10_000.0] {
        g.bench_function(format!("limit_{limit}"), |b| {
            b.iter(|| prog.execute(black_box(&[Value::Number(limit)])))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
