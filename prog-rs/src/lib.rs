//! Prog: a small, statically typed scripting language for game hosts.
//!
//! A prog is a named, typed procedure written one statement per line.  The
//! compiler checks declarations, assignments and block structure against a
//! [`ProgVariableType`] algebra before anything runs, and produces a tree of
//! statements that a host can execute any number of times.
//!
//! Expressions are delegated to an [`expr::ExpressionCompiler`], so hosts can
//! bring their own expression language; [`StandardCompiler`] is included.
//! Deferred `delay` blocks go through a host-supplied [`Scheduler`].
//!
//! ```rust
//! use prog::{Prog, ProgDefinition, ProgVariableType, Value};
//!
//! let src = "
//! var top as number
//! foreach (score in @scores)
//!   if (@score > @top)
//!     top = @score
//!   end if
//! end foreach
//! return @top";
//! let def = ProgDefinition::new("best", ProgVariableType::NUMBER, src)
//!     .with_parameter("scores", ProgVariableType::NUMBER | ProgVariableType::COLLECTION);
//! let prog = Prog::compile_standard(&def).unwrap();
//! let scores = Value::collection([3.0, 9.0, 4.0].map(Value::Number));
//! assert_eq!(prog.execute(&[scores]), Ok(Value::Number(9.0)));
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod prog;
pub mod runtime;
pub mod scheduler;
pub mod scope;
pub mod source;
pub mod statements;
pub mod types;
pub mod value;
pub mod variables;

pub use config::CompilerConfig;
pub use error::{CompileError, ConfigError, RuntimeError};
pub use expr::{ExpressionCompiler, FunctionLibrary, ProgExpression, StandardCompiler};
pub use prog::{Prog, ProgDefinition};
pub use runtime::Runtime;
pub use scheduler::{DelayQueue, Scheduler};
pub use scope::LexicalScope;
pub use statements::{Statement, StatementResult};
pub use types::ProgVariableType;
pub use value::Value;
pub use variables::VariableSpace;
