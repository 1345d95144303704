//! Binding a contract to a library.

use std::fmt;
use std::sync::Arc;

use dlbind_core::{Contract, ImplementationOptions, SymbolNaming};
use dlbind_dllmap::DllMapResolver;
use dlbind_loader::{LibraryLoader, LibraryPathResolver, NativeLoader, SearchContext};
use dlbind_marshal::{ManglerRegistry, TransformerRegistry};
use dlbind_targets::Platform;

use crate::error::Result;
use crate::form::{FormRegistry, ImplementationForm, MemberPlan};
use crate::instance::BoundInstance;
use crate::library::LibraryState;
use crate::pipeline::{BindingContext, Pipeline, Registries};

/// Binds contracts to native libraries.
///
/// Unset collaborators default at activation: the host platform, a path
/// resolver over the process environment, the dllmap file beside the
/// running executable (only with `ENABLE_DLL_MAP_SUPPORT`), and the
/// process-wide registries.
#[derive(Clone)]
pub struct NativeLibraryBuilder {
    options: ImplementationOptions,
    loader: Arc<dyn LibraryLoader>,
    resolver: Option<Arc<LibraryPathResolver>>,
    dllmap: Option<Arc<DllMapResolver>>,
    platform: Option<Platform>,
    naming: Option<SymbolNaming>,
    registries: Registries,
    pipeline: Arc<Pipeline>,
    forms: Option<Arc<FormRegistry>>,
}

impl NativeLibraryBuilder {
    pub fn new() -> Self {
        Self {
            options: ImplementationOptions::empty(),
            loader: Arc::new(NativeLoader::new()),
            resolver: None,
            dllmap: None,
            platform: None,
            naming: None,
            registries: Registries::default(),
            pipeline: Arc::new(Pipeline::standard()),
            forms: None,
        }
    }

    pub fn with_options(mut self, options: ImplementationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_loader(self, loader: impl LibraryLoader + 'static) -> Self {
        self.with_shared_loader(Arc::new(loader))
    }

    pub fn with_shared_loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_resolver(mut self, resolver: LibraryPathResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Redirection used under `ENABLE_DLL_MAP_SUPPORT`.
    pub fn with_dllmap(mut self, dllmap: DllMapResolver) -> Self {
        self.dllmap = Some(Arc::new(dllmap));
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Naming policy that replaces the contract's own.
    pub fn with_naming(mut self, naming: SymbolNaming) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn with_transformers(mut self, transformers: Arc<TransformerRegistry>) -> Self {
        self.registries.transformers = Some(transformers);
        self
    }

    pub fn with_manglers(mut self, manglers: Arc<ManglerRegistry>) -> Self {
        self.registries.manglers = Some(manglers);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    /// Form registry to intern into instead of the process-wide one.
    pub fn with_forms(mut self, forms: Arc<FormRegistry>) -> Self {
        self.forms = Some(forms);
        self
    }

    pub fn options(&self) -> ImplementationOptions {
        self.options
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Bind `contract` to `library`.
    ///
    /// With eager binding every symbol is resolved here and the first
    /// missing one fails the whole activation.
    pub fn activate(&self, contract: &Contract, library: &str) -> Result<BoundInstance> {
        self.activate_shared(Arc::new(contract.clone()), library)
    }

    pub fn activate_shared(&self, contract: Arc<Contract>, library: &str) -> Result<BoundInstance> {
        contract.validate()?;
        let contract = match &self.naming {
            Some(naming) if *naming != contract.naming => {
                let mut renamed = (*contract).clone();
                renamed.naming = naming.clone();
                Arc::new(renamed)
            }
            _ => contract,
        };
        let (blueprint, platform, resolver) = self.resolved()?;

        let dllmap = blueprint
            .options
            .contains(ImplementationOptions::ENABLE_DLL_MAP_SUPPORT)
            .then(|| blueprint.dllmap.clone())
            .flatten();
        let mapped = match &dllmap {
            Some(dllmap) => dllmap.map_library_name(library)?,
            None => library.to_string(),
        };

        let state = Arc::new(LibraryState::open(
            &mapped,
            Arc::clone(&blueprint.loader),
            resolver,
        )?);
        let ctx = BindingContext {
            contract: Arc::clone(&contract),
            options: blueprint.options,
            platform,
            requested_library: library.to_string(),
            library: Arc::clone(&state),
            registries: blueprint.registries.clone(),
            dllmap,
        };

        let mut bindings = Vec::with_capacity(contract.members.len());
        let mut plans = Vec::with_capacity(contract.members.len());
        for index in 0..contract.members.len() {
            let unit = ctx.root_unit(index)?;
            let name = unit.name().to_string();
            let member = blueprint.pipeline.bind(unit, &ctx)?;
            plans.push(MemberPlan {
                name,
                symbol: member.symbol.to_string(),
                stages: member.stages.iter().map(|s| s.to_string()).collect(),
            });
            bindings.push(member.binding);
        }

        let form = ImplementationForm::new(
            &contract.name,
            &contract.fingerprint()?,
            &mapped,
            blueprint.options,
            plans,
        );
        let form = match &blueprint.forms {
            Some(forms) => forms.intern(form),
            None => FormRegistry::global().intern(form),
        };

        let instance = BoundInstance::new(contract, form, state, library, bindings, blueprint);
        tracing::info!(
            target: "dlbind::bind",
            id = %instance.id(),
            contract = instance.contract().name.as_str(),
            library = mapped.as_str(),
            options = ?instance.options().names(),
            "activated library instance"
        );
        Ok(instance)
    }

    /// Copy of the builder with every defaulted collaborator filled in,
    /// plus the platform and path resolver it settled on.
    fn resolved(&self) -> Result<(Self, Platform, Arc<LibraryPathResolver>)> {
        let mut resolved = self.clone();
        let platform = match resolved.platform {
            Some(platform) => platform,
            None => Platform::current()?,
        };
        resolved.platform = Some(platform);
        let resolver = match &resolved.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => Arc::new(LibraryPathResolver::new(
                platform,
                SearchContext::from_process(platform.os),
            )),
        };
        resolved.resolver = Some(Arc::clone(&resolver));
        if resolved.dllmap.is_none()
            && resolved
                .options
                .contains(ImplementationOptions::ENABLE_DLL_MAP_SUPPORT)
        {
            resolved.dllmap = Some(Arc::new(DllMapResolver::for_current_exe(platform)?));
        }
        Ok((resolved, platform, resolver))
    }
}

impl Default for NativeLibraryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeLibraryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibraryBuilder")
            .field("options", &self.options)
            .field("loader", &self.loader)
            .field("platform", &self.platform)
            .field("dllmap", &self.dllmap.is_some())
            .field("stages", &self.pipeline.stage_names())
            .finish()
    }
}
