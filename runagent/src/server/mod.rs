//! Agent server components
//!
//! Everything needed to host a project locally: the callable registry the
//! embedding application fills in, the project loader, the dispatcher, and
//! the HTTP/WebSocket server that exposes them.

pub mod callables;
pub mod dispatcher;
pub mod handlers;
pub mod loader;
pub mod local_server;

// Re-export the main server types
pub use callables::{AgentCallable, CallableRegistry, ChunkStream, ModuleSymbol};
pub use dispatcher::{Dispatcher, InvocationStream};
pub use loader::{ProjectLoader, ResolvedEntrypoint};
pub use local_server::{LocalServer, ServerInfo, ShutdownHandle};
