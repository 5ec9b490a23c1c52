//! Closure-backed solutions.
//!
//! A [`Solution`] is a named set of scopes, each implementing some of the
//! [`Operation`]s as plain Rust closures. The binary and the integration
//! tests run on these; an embedding that drives a real script engine
//! implements [`Session`] directly instead.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    Exchange, Existence, InvokeError, Operation, PoolError, Properties, Session, SessionFactory,
    NODEBUG_SUFFIX,
};
use crate::content::Payload;

/// What an operation closure gets to see.
pub struct Invocation<'a> {
    pub args: Vec<Payload>,
    pub properties: &'a mut Properties,
    pub exchange: &'a mut Exchange,
}

pub type OperationFn =
    Arc<dyn Fn(&mut Invocation<'_>) -> Result<Payload, InvokeError> + Send + Sync>;

#[derive(Clone)]
pub struct Solution {
    name: String,
    loaded: bool,
    scopes: HashMap<String, HashMap<Operation, OperationFn>>,
}

impl Solution {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), loaded: true, scopes: HashMap::new() }
    }

    /// Declare a scope with no operations yet.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.entry(scope.into()).or_default();
        self
    }

    pub fn operation<F>(mut self, scope: impl Into<String>, operation: Operation, f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> Result<Payload, InvokeError> + Send + Sync + 'static,
    {
        self.scopes.entry(scope.into()).or_default().insert(operation, Arc::new(f));
        self
    }

    /// Mark the solution as failed to load. Every lookup reports
    /// [`Existence::NoSolution`].
    pub fn unloaded(mut self) -> Self {
        self.loaded = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Solutions by session key.
#[derive(Clone, Default)]
pub struct SolutionRegistry {
    solutions: HashMap<String, Arc<Solution>>,
}

impl SolutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, solution: Solution) -> Self {
        self.register(solution);
        self
    }

    pub fn register(&mut self, solution: Solution) {
        self.solutions.insert(solution.name.clone(), Arc::new(solution));
    }

    /// Look up the solution behind a session key. The debug-suppression
    /// suffix selects the same solution.
    pub fn get(&self, key: &str) -> Option<Arc<Solution>> {
        let name = key.strip_suffix(NODEBUG_SUFFIX).unwrap_or(key);
        self.solutions.get(name).cloned()
    }

    /// A pool factory building a fresh [`ScriptedSession`] per call.
    pub fn into_factory(self) -> SessionFactory {
        Arc::new(move |key: &str| {
            let solution = self
                .get(key)
                .ok_or_else(|| PoolError::UnknownSolution(key.to_string()))?;
            Ok(Box::new(ScriptedSession::new(solution)) as Box<dyn Session>)
        })
    }
}

pub struct ScriptedSession {
    solution: Arc<Solution>,
    properties: Properties,
}

impl ScriptedSession {
    pub fn new(solution: Arc<Solution>) -> Self {
        Self { solution, properties: Properties::new() }
    }
}

impl Session for ScriptedSession {
    fn solution_name(&self) -> &str {
        &self.solution.name
    }

    fn operation_exists(&self, scope: &str, operation: Operation) -> Existence {
        if !self.solution.loaded {
            return Existence::NoSolution;
        }
        match self.solution.scopes.get(scope) {
            None => Existence::ScopeNotFound,
            Some(ops) if ops.contains_key(&operation) => Existence::Found,
            Some(_) => Existence::NotFound,
        }
    }

    fn invoke(
        &mut self,
        scope: &str,
        operation: Operation,
        args: Vec<Payload>,
        exchange: &mut Exchange,
    ) -> Result<Payload, InvokeError> {
        let f = self
            .solution
            .scopes
            .get(scope)
            .and_then(|ops| ops.get(&operation))
            .cloned()
            .ok_or_else(|| {
                InvokeError::Engine(format!("{} not found on {}", operation.function_name(), scope))
            })?;
        let mut invocation = Invocation { args, properties: &mut self.properties, exchange };
        f(&mut invocation)
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn set_properties(&mut self, properties: Properties) {
        self.properties = properties;
    }
}
