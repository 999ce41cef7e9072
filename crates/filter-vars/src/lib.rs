//! `filter-vars` computes the variables that abuse filters are evaluated
//! against, deferring every expensive one until a filter first reads it.
//!
//! ## Examples
//!
//! ```rust
//! use filter_vars::{
//!     ComputationKind, Config, LazyVariableComputer, Param, RetrievalMode, Value,
//!     VariableHolder, VariablesManager, memory::MemoryWiki,
//! };
//! use std::rc::Rc;
//!
//! let wiki = Rc::new(MemoryWiki::new());
//! let computer = LazyVariableComputer::new(MemoryWiki::services(&wiki), Config::default());
//! let manager = VariablesManager::new(computer);
//!
//! let mut holder = VariableHolder::new();
//! holder.set_value("new_wikitext", "hello");
//! holder.set_lazy(
//!     "new_size",
//!     ComputationKind::Length,
//!     [("length-var", Param::var("new_wikitext"))],
//! );
//!
//! assert_eq!(manager.get_var(&mut holder, "NEW_SIZE", RetrievalMode::Strict), Ok(Value::Int(5)));
//! assert_eq!(manager.get_var(&mut holder, "old_size", RetrievalMode::Lax), Ok(Value::UNDEFINED));
//! ```
mod cache;
mod computer;
mod config;
mod error;
mod generator;
mod holder;
pub mod keywords;
mod lazy;
mod manager;
pub mod memory;
mod profiling;
mod services;
mod value;

pub use cache::{MemoryObjectCache, ObjectCache, ParseCache};
pub use computer::{ComputeInterceptor, LazyVariableComputer, Resolver, VariableComputer};
pub use config::{Config, LogFormat};
pub use error::Error;
pub use generator::{EditContext, VariableGenerator};
pub use holder::{HolderError, Slot, VariableHolder};
pub use lazy::{ComputationKind, LazyDescriptor, Param};
pub use manager::{ComputeSelection, RetrievalMode, VariablesManager};
pub use profiling::ExcludedProfilingTime;
pub use services::{
    LookupError, PageRef, PageStore, ParserOutput, PreparedUpdate, RevisionRecord,
    RevisionStore, Services, UserKind, UserRef, UserStore, WikitextParser,
};
pub use value::Value;
