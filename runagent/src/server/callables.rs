//! Host-registered agent callables
//!
//! The runtime dispatches into user-authored functions it treats as opaque:
//! a unary callable resolves to a single value, a streaming callable to a
//! lazy sequence of chunks. Projects declare entrypoints by `(file, module)`
//! in their config; the embedding application registers the matching
//! callables here before the server loads the project.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Lazy chunk sequence produced by a streaming callable
pub type ChunkStream = BoxStream<'static, anyhow::Result<Value>>;

/// Boxed unary callable: positional args plus keyword args to one value
pub type UnaryFn =
    Arc<dyn Fn(Vec<Value>, Map<String, Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Boxed streaming callable: positional args plus keyword args to a chunk stream
pub type StreamFn = Arc<dyn Fn(Vec<Value>, Map<String, Value>) -> ChunkStream + Send + Sync>;

/// A user callable, in one of the two invocation shapes
#[derive(Clone)]
pub enum AgentCallable {
    Unary(UnaryFn),
    Streaming(StreamFn),
}

impl AgentCallable {
    pub fn is_streaming(&self) -> bool {
        matches!(self, AgentCallable::Streaming(_))
    }
}

impl fmt::Debug for AgentCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentCallable::Unary(_) => f.write_str("AgentCallable::Unary"),
            AgentCallable::Streaming(_) => f.write_str("AgentCallable::Streaming"),
        }
    }
}

/// A resolvable module symbol. Mirrors a module attribute in the source
/// tree: usually a callable, occasionally a plain value that an entrypoint
/// erroneously points at.
#[derive(Debug, Clone)]
pub enum ModuleSymbol {
    Callable(AgentCallable),
    Value(Value),
}

/// Registry of module symbols keyed by `(file, module)` as declared in the
/// project config. Built once by the embedding application, read-only after
/// project load.
#[derive(Default)]
pub struct CallableRegistry {
    symbols: HashMap<(String, String), ModuleSymbol>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Register a symbol under `(file, module)`
    pub fn register<F: Into<String>, M: Into<String>>(
        &mut self,
        file: F,
        module: M,
        symbol: ModuleSymbol,
    ) -> &mut Self {
        self.symbols.insert((file.into(), module.into()), symbol);
        self
    }

    /// Register an async unary callable
    pub fn register_fn<F, M, Fun, Fut>(&mut self, file: F, module: M, f: Fun) -> &mut Self
    where
        F: Into<String>,
        M: Into<String>,
        Fun: Fn(Vec<Value>, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let callable: UnaryFn = Arc::new(move |args, kwargs| f(args, kwargs).boxed());
        self.register(file, module, ModuleSymbol::Callable(AgentCallable::Unary(callable)))
    }

    /// Register a streaming callable
    pub fn register_stream_fn<F, M, Fun, St>(&mut self, file: F, module: M, f: Fun) -> &mut Self
    where
        F: Into<String>,
        M: Into<String>,
        Fun: Fn(Vec<Value>, Map<String, Value>) -> St + Send + Sync + 'static,
        St: Stream<Item = anyhow::Result<Value>> + Send + 'static,
    {
        let callable: StreamFn = Arc::new(move |args, kwargs| f(args, kwargs).boxed());
        self.register(
            file,
            module,
            ModuleSymbol::Callable(AgentCallable::Streaming(callable)),
        )
    }

    /// Register a plain (non-callable) value
    pub fn register_value<F: Into<String>, M: Into<String>>(
        &mut self,
        file: F,
        module: M,
        value: Value,
    ) -> &mut Self {
        self.register(file, module, ModuleSymbol::Value(value))
    }

    /// Resolve a symbol by the `(file, module)` pair from an entrypoint spec
    pub fn resolve(&self, file: &str, module: &str) -> Option<&ModuleSymbol> {
        self.symbols
            .get(&(file.to_string(), module.to_string()))
    }
}

impl fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableRegistry")
            .field("symbols", &self.symbols.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_invoke_unary() {
        let mut registry = CallableRegistry::new();
        registry.register_fn("main.py", "run", |args, kwargs| async move {
            let q = kwargs
                .get("q")
                .and_then(|v| v.as_str())
                .or_else(|| args.first().and_then(|v| v.as_str()))
                .unwrap_or_default()
                .to_string();
            Ok(json!(format!("ok:{}", q)))
        });

        let symbol = registry.resolve("main.py", "run").unwrap();
        let callable = match symbol {
            ModuleSymbol::Callable(c) => c.clone(),
            other => panic!("unexpected symbol: {:?}", other),
        };

        let mut kwargs = Map::new();
        kwargs.insert("q".to_string(), json!("hi"));
        match callable {
            AgentCallable::Unary(f) => {
                let out = f(Vec::new(), kwargs).await.unwrap();
                assert_eq!(out, json!("ok:hi"));
            }
            AgentCallable::Streaming(_) => panic!("expected unary"),
        }
    }

    #[tokio::test]
    async fn test_register_and_drain_stream() {
        let mut registry = CallableRegistry::new();
        registry.register_stream_fn("main.py", "run_stream", |_args, _kwargs| {
            futures::stream::iter(vec![Ok(json!("a")), Ok(json!("b")), Ok(json!("c"))])
        });

        let symbol = registry.resolve("main.py", "run_stream").unwrap();
        let f = match symbol {
            ModuleSymbol::Callable(AgentCallable::Streaming(f)) => f.clone(),
            other => panic!("expected streaming callable, got {:?}", other),
        };

        let chunks: Vec<Value> = f(Vec::new(), Map::new())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_non_callable_symbol() {
        let mut registry = CallableRegistry::new();
        registry.register_value("main.py", "MODEL_NAME", json!("gpt-4o"));

        match registry.resolve("main.py", "MODEL_NAME") {
            Some(ModuleSymbol::Value(v)) => assert_eq!(v, &json!("gpt-4o")),
            other => panic!("unexpected symbol: {:?}", other),
        }
        assert!(registry.resolve("main.py", "missing").is_none());
        assert!(registry.resolve("other.py", "MODEL_NAME").is_none());
    }
}
