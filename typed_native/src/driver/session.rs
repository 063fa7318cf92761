//! The compilation session
//!
//! Everything that must outlive one function conversion lives here: the
//! wrapper registry, the identity cache, symbol names, finished
//! definitions, and the set of definitions not yet handed to a backend.
//!
//! A definition is reserved under its identity before its body is
//! generated, so a request that re-enters while the body is being built
//! (a recursive call, a list destructor needed by its own element type)
//! resolves to the reserved name instead of starting over. When a
//! conversion fails, everything reserved since it started is rolled back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use tracing::{debug, instrument, trace};

use super::call_converter::{converter_args, converter_body};
use super::identity::CompilationIdentity;
use super::naming::NameAllocator;
use super::target::CompiledTarget;
use crate::config::CompilerConfig;
use crate::convert::FunctionConverter;
use crate::error::{conversion_error, ConversionError};
use crate::native::{CallTarget, NativeExpr, NativeFunction, NativeType};
use crate::typed_value::CResult;
use crate::types::TypeKey;
use crate::value::FunctionRef;
use crate::wrappers::{TypeRegistry, WrapperRef};

/// Outcome of requesting a Python specialization.
#[derive(Debug, Clone)]
pub enum CallResolution {
    Compiled(Rc<CompiledTarget>),
    /// The specialization is being converted further up the stack.
    /// `output` is its declared output type, or the type its returns had
    /// in the last pass, if there were any.
    InFlight { name: String, output: Option<TypeKey> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Specializations converted (cache misses).
    pub compiles: usize,
    pub cache_hits: usize,
    /// Type-inference passes over all conversions.
    pub passes: usize,
    pub definitions_extracted: usize,
}

#[derive(Debug)]
enum CacheEntry {
    InFlight {
        name: String,
        provisional: Option<TypeKey>,
        /// Output types handed out to callers, with the identity that asked.
        observed: Vec<(Option<CompilationIdentity>, TypeKey)>,
    },
    Compiled(Rc<CompiledTarget>),
    Native(CallTarget),
}

impl CacheEntry {
    fn name(&self) -> &str {
        match self {
            CacheEntry::InFlight { name, .. } => name,
            CacheEntry::Compiled(target) => &target.name,
            CacheEntry::Native(target) => &target.name,
        }
    }
}

#[derive(Debug, Default)]
pub struct CompilationSession {
    config: CompilerConfig,
    registry: TypeRegistry,
    names: NameAllocator,
    cache: HashMap<CompilationIdentity, CacheEntry>,
    definitions: BTreeMap<String, NativeFunction>,
    pending: BTreeSet<String>,
    /// Python specializations being converted, innermost last.
    in_flight: Vec<CompilationIdentity>,
    /// Identities reserved since the outermost active definition started.
    journal: Vec<CompilationIdentity>,
    active: usize,
    stats: SessionStats,
}

impl CompilationSession {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn wrapper(&mut self, key: &TypeKey) -> WrapperRef {
        self.registry.get(key)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn definition(&self, name: &str) -> Option<&NativeFunction> {
        self.definitions.get(name)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn base_name(&self, identity: &CompilationIdentity, base: &str) -> String {
        format!("{}{}{}", self.config.name_prefix, identity.name_prefix(), base)
    }

    fn reserve(&mut self, identity: &CompilationIdentity, full_name: &str) -> String {
        let name = self.names.allocate(full_name);
        self.journal.push(identity.clone());
        name
    }

    fn publish(&mut self, name: &str, function: NativeFunction) {
        debug!(name, args = function.args.len(), "definition added");
        self.definitions.insert(name.to_string(), function);
        self.pending.insert(name.to_string());
    }

    fn begin(&mut self) -> usize {
        self.active += 1;
        self.journal.len()
    }

    fn end(&mut self) {
        self.active -= 1;
        if self.active == 0 {
            self.journal.clear();
        }
    }

    /// Forget every identity reserved after `mark`.
    fn rollback(&mut self, mark: usize) {
        for identity in self.journal.split_off(mark).into_iter().rev() {
            if let Some(entry) = self.cache.remove(&identity) {
                let name = entry.name().to_string();
                debug!(%identity, name = %name, "rolled back");
                self.names.release(&name);
                self.definitions.remove(&name);
                self.pending.remove(&name);
            }
        }
    }

    // ========== Python functions ==========

    /// Compile `function` for `inputs`, or find it in the cache. `output`
    /// forces the return type instead of inferring it.
    #[instrument(level = "debug", skip_all, fields(function = function.name()))]
    pub fn convert_function(
        &mut self,
        function: &FunctionRef,
        inputs: &[TypeKey],
        output: Option<TypeKey>,
    ) -> CResult<CallResolution> {
        let identity = CompilationIdentity::for_function(function, inputs, output.as_ref());
        let observer = self.in_flight.last().cloned();
        match self.cache.get_mut(&identity) {
            Some(CacheEntry::Compiled(target)) => {
                self.stats.cache_hits += 1;
                trace!(name = %target.name, "cache hit");
                return Ok(CallResolution::Compiled(target.clone()));
            }
            Some(CacheEntry::InFlight {
                name,
                provisional,
                observed,
            }) => {
                if let Some(seen) = provisional {
                    observed.push((observer, seen.clone()));
                }
                return Ok(CallResolution::InFlight {
                    name: name.clone(),
                    output: provisional.clone(),
                });
            }
            Some(CacheEntry::Native(_)) => {
                return conversion_error(format!("{} is registered as a native helper", identity));
            }
            None => {}
        }

        let params = function.ast.args().len();
        if params != inputs.len() {
            return Err(ConversionError::new(format!(
                "{}() takes {} argument(s) but {} types were given",
                function.name(),
                params,
                inputs.len()
            ))
            .in_function(function.name()));
        }

        let mark = self.begin();
        let base = if function.ast.is_lambda() { "lambda" } else { function.name() };
        let full_name = self.base_name(&identity, base);
        let name = self.reserve(&identity, &full_name);
        debug!(name = %name, inputs = ?inputs, "cache miss");
        self.cache.insert(
            identity.clone(),
            CacheEntry::InFlight {
                name: name.clone(),
                provisional: output.clone(),
                observed: Vec::new(),
            },
        );
        self.in_flight.push(identity.clone());
        self.stats.compiles += 1;

        let result = FunctionConverter::new(self, function.clone(), inputs.to_vec(), output).convert();
        self.in_flight.pop();
        let result = result.and_then(|converted| {
            self.check_observations(&identity, function, &converted.output)?;
            Ok(converted)
        });
        let converted = match result {
            Ok(converted) => converted,
            Err(err) => {
                self.rollback(mark);
                self.end();
                return Err(err);
            }
        };

        let input_wrappers: Vec<WrapperRef> = inputs.iter().map(|key| self.wrapper(key)).collect();
        let output_wrapper = self.wrapper(&converted.output);
        let target = Rc::new(CompiledTarget::new(
            name.clone(),
            inputs.to_vec(),
            &input_wrappers,
            &output_wrapper,
        ));
        debug!(name = %name, output = %converted.output, passes = converted.passes, "compiled");
        self.cache.insert(identity, CacheEntry::Compiled(target.clone()));
        self.publish(&name, converted.function);
        self.end();
        Ok(CallResolution::Compiled(target))
    }

    /// Callers further up the stack compiled calls against the provisional
    /// output type; they are only valid if it did not change afterwards.
    fn check_observations(
        &self,
        identity: &CompilationIdentity,
        function: &FunctionRef,
        output: &TypeKey,
    ) -> CResult<()> {
        let Some(CacheEntry::InFlight { observed, .. }) = self.cache.get(identity) else {
            return Ok(());
        };
        for (observer, seen) in observed {
            if observer.as_ref() != Some(identity) && seen != output {
                return Err(ConversionError::new(format!(
                    "the return type of '{}' changed from '{}' to '{}' after a recursive call used it; \
                     declare its output type",
                    function.name(),
                    seen,
                    output
                ))
                .in_function(function.name()));
            }
        }
        Ok(())
    }

    /// Convert `function` for `inputs` and return the finished target.
    pub fn compile(
        &mut self,
        function: &FunctionRef,
        inputs: &[TypeKey],
        output: Option<TypeKey>,
    ) -> CResult<Rc<CompiledTarget>> {
        match self.convert_function(function, inputs, output)? {
            CallResolution::Compiled(target) => Ok(target),
            CallResolution::InFlight { name, .. } => {
                conversion_error(format!("'{}' is still being compiled", name))
            }
        }
    }

    pub fn record_pass(&mut self) {
        self.stats.passes += 1;
    }

    /// The innermost specialization's returns joined to `output` so far.
    pub fn set_provisional_output(&mut self, output: TypeKey) {
        let Some(identity) = self.in_flight.last() else {
            return;
        };
        if let Some(CacheEntry::InFlight { provisional, .. }) = self.cache.get_mut(identity) {
            *provisional = Some(output);
        }
    }

    // ========== Native definitions ==========

    /// Define a native helper once per identity.
    ///
    /// The target is reserved before `generate` runs, and `generate` may
    /// request the same identity again; the re-entrant request gets the
    /// reserved target. If `generate` fails nothing it defined remains.
    pub fn define_native_function<F>(
        &mut self,
        identity: CompilationIdentity,
        base: &str,
        args: Vec<(String, NativeType)>,
        output: NativeType,
        generate: F,
    ) -> CResult<CallTarget>
    where
        F: FnOnce(&mut CompilationSession, &CallTarget) -> CResult<NativeExpr>,
    {
        match self.cache.get(&identity) {
            Some(CacheEntry::Native(target)) => {
                self.stats.cache_hits += 1;
                return Ok(target.clone());
            }
            Some(_) => return conversion_error(format!("{} is not a native helper", identity)),
            None => {}
        }
        let mark = self.begin();
        let full_name = self.base_name(&identity, base);
        self.define_reserved(identity, &full_name, args, output, generate, mark)
    }

    fn define_reserved<F>(
        &mut self,
        identity: CompilationIdentity,
        full_name: &str,
        args: Vec<(String, NativeType)>,
        output: NativeType,
        generate: F,
        mark: usize,
    ) -> CResult<CallTarget>
    where
        F: FnOnce(&mut CompilationSession, &CallTarget) -> CResult<NativeExpr>,
    {
        let name = self.reserve(&identity, full_name);
        let arg_types = args.iter().map(|(_, ty)| ty.clone()).collect();
        let target = CallTarget::internal(name.clone(), arg_types, output.clone());
        self.cache.insert(identity, CacheEntry::Native(target.clone()));
        match generate(self, &target) {
            Ok(body) => {
                self.publish(&name, NativeFunction::new(args, output, body));
                self.end();
                Ok(target)
            }
            Err(err) => {
                self.rollback(mark);
                self.end();
                Err(err)
            }
        }
    }

    /// Register a prebuilt definition under `key`.
    pub fn define(&mut self, key: &str, base: &str, definition: NativeFunction) -> CResult<CallTarget> {
        let identity = CompilationIdentity::Defined(key.to_string());
        let args = definition.args.clone();
        let output = definition.output_type.clone();
        let body = definition.body;
        self.define_native_function(identity, base, args, output, move |_, _| Ok(body))
    }

    /// The `(void*, void**) -> void` entry point for `target`.
    #[instrument(level = "debug", skip_all, fields(target = %target.name))]
    pub fn generate_call_converter(&mut self, target: &CompiledTarget) -> CResult<CallTarget> {
        let identity = CompilationIdentity::CallConverter(target.name.clone());
        if let Some(CacheEntry::Native(converter)) = self.cache.get(&identity) {
            self.stats.cache_hits += 1;
            return Ok(converter.clone());
        }
        let mark = self.begin();
        let full_name = format!("{}.converter", target.name);
        let target = target.clone();
        self.define_reserved(
            identity,
            &full_name,
            converter_args(),
            NativeType::Void,
            move |session, _| converter_body(session, &target),
            mark,
        )
    }

    /// Definitions added since the last call, by name. Each definition is
    /// returned exactly once.
    pub fn extract_new_definitions(&mut self) -> BTreeMap<String, NativeFunction> {
        let pending = std::mem::take(&mut self.pending);
        let mut out = BTreeMap::new();
        for name in pending {
            if let Some(function) = self.definitions.get(&name) {
                if self.config.verbose {
                    debug!(target: "typed_native::ir", "{}", function.pretty(&name));
                }
                out.insert(name, function.clone());
            }
        }
        self.stats.definitions_extracted += out.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn helper_args() -> Vec<(String, NativeType)> {
        vec![("a.x".to_string(), NativeType::int64())]
    }

    #[test]
    fn test_native_definition_is_generated_once() {
        let mut session = CompilationSession::default();
        let runs = Cell::new(0);
        let identity = CompilationIdentity::Native("helper".into(), vec![TypeKey::Int]);
        let first = session
            .define_native_function(identity.clone(), "helper", helper_args(), NativeType::int64(), |_, _| {
                runs.set(runs.get() + 1);
                Ok(NativeExpr::ret(Some(NativeExpr::variable("a.x"))))
            })
            .unwrap();
        let second = session
            .define_native_function(identity, "helper", helper_args(), NativeType::int64(), |_, _| {
                runs.set(runs.get() + 1);
                Ok(NativeExpr::void())
            })
            .unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first.name, "runtime.helper");
        assert_eq!(session.stats().cache_hits, 1);
    }

    #[test]
    fn test_reentrant_request_gets_reserved_target() {
        let mut session = CompilationSession::default();
        let identity = CompilationIdentity::Native("self_ref".into(), vec![]);
        let runs = Cell::new(0);
        let again = identity.clone();
        let target = session
            .define_native_function(identity, "self_ref", vec![], NativeType::Void, |session, reserved| {
                runs.set(runs.get() + 1);
                let inner = session.define_native_function(again, "self_ref", vec![], NativeType::Void, |_, _| {
                    panic!("generator must not run twice")
                })?;
                assert_eq!(&inner, reserved);
                Ok(inner.call(vec![]))
            })
            .unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(target.name, "runtime.self_ref");
        assert!(session.is_defined("runtime.self_ref"));
    }

    #[test]
    fn test_failed_generator_leaves_nothing() {
        let mut session = CompilationSession::default();
        let outer = CompilationIdentity::Native("outer".into(), vec![]);
        let inner = CompilationIdentity::Native("inner".into(), vec![]);
        let result = session.define_native_function(outer.clone(), "outer", vec![], NativeType::Void, |session, _| {
            session.define_native_function(inner, "inner", vec![], NativeType::Void, |_, _| Ok(NativeExpr::void()))?;
            conversion_error("boom")
        });
        assert!(result.is_err());
        assert!(!session.is_defined("runtime.inner"));
        assert_eq!(session.pending_count(), 0);
        assert!(session.extract_new_definitions().is_empty());

        // the name is free again
        let target = session
            .define_native_function(outer, "outer", vec![], NativeType::Void, |_, _| Ok(NativeExpr::void()))
            .unwrap();
        assert_eq!(target.name, "runtime.outer");
    }

    #[test]
    fn test_extract_drains_once() {
        let mut session = CompilationSession::new(CompilerConfig {
            name_prefix: "jit.".into(),
            ..CompilerConfig::default()
        });
        let definition = NativeFunction::new(vec![], NativeType::Void, NativeExpr::ret(None));
        let target = session.define("noop", "noop", definition.clone()).unwrap();
        assert_eq!(target.name, "jit.defined.noop");
        let extracted = session.extract_new_definitions();
        assert_eq!(extracted.keys().collect::<Vec<_>>(), ["jit.defined.noop"]);
        assert_eq!(extracted["jit.defined.noop"], definition);
        assert!(session.extract_new_definitions().is_empty());
        assert_eq!(session.stats().definitions_extracted, 1);
    }
}
