//! View factory and plugin registration.
//!
//! The host instantiates platform views through a factory registered under
//! the fixed [`VIEW_TYPE`](crate::channel::VIEW_TYPE) string. Registration
//! follows the host activity lifecycle: registered on attachment,
//! re-registered on a configuration change (the registry simply replaces the
//! entry), torn down on detachment.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    assets::{AssetSource, environment::EnvironmentSource},
    channel::{MessageTransport, VIEW_TYPE},
    context::SharedDispatcher,
    controller::{ControllerDeps, DisplayContext, ViewController},
    engine::RenderEngine,
    remote::RemoteSource,
    scene::SceneKind,
};

/// Creates one [`ViewController`] per platform-view instance.
pub struct ViewFactory {
    display: DisplayContext,
    transport: Rc<dyn MessageTransport>,
    engines: Rc<dyn Fn() -> Box<dyn RenderEngine>>,
    assets: Rc<dyn AssetSource>,
    environments: Option<Rc<dyn EnvironmentSource>>,
    remotes: Option<Box<dyn Fn() -> Box<dyn RemoteSource>>>,
    dispatcher: SharedDispatcher,
    scene: SceneKind,
}

impl ViewFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        display: DisplayContext,
        transport: Rc<dyn MessageTransport>,
        engines: Rc<dyn Fn() -> Box<dyn RenderEngine>>,
        assets: Rc<dyn AssetSource>,
        environments: Option<Rc<dyn EnvironmentSource>>,
        remotes: Option<Box<dyn Fn() -> Box<dyn RemoteSource>>>,
        dispatcher: SharedDispatcher,
        scene: SceneKind,
    ) -> Self {
        Self {
            display,
            transport,
            engines,
            assets,
            environments,
            remotes,
            dispatcher,
            scene,
        }
    }

    pub fn create(&self, view_id: i32) -> ViewController {
        // Engine creation is deferred until provide_view.
        let engines = Rc::clone(&self.engines);
        ViewController::new(
            view_id,
            self.display.clone(),
            Rc::clone(&self.transport),
            ControllerDeps {
                engine_factory: Box::new(move || engines()),
                assets: Rc::clone(&self.assets),
                environments: self.environments.clone(),
                remote: self.remotes.as_ref().map(|make| make()),
                dispatcher: self.dispatcher.clone(),
                scene: self.scene.clone(),
            },
        )
    }
}

/// Registry of view factories keyed by view-type string, owned by the host
/// embedding layer.
#[derive(Default)]
pub struct ViewRegistry {
    factories: RefCell<HashMap<String, Rc<ViewFactory>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces, on activity reattachment) a factory.
    pub fn register(&self, view_type: &str, factory: Rc<ViewFactory>) {
        self.factories
            .borrow_mut()
            .insert(view_type.to_owned(), factory);
    }

    pub fn unregister(&self, view_type: &str) {
        self.factories.borrow_mut().remove(view_type);
    }

    /// Instantiates a view of `view_type`, if a factory is registered.
    pub fn create_view(&self, view_type: &str, view_id: i32) -> Option<ViewController> {
        let factory = self.factories.borrow().get(view_type).cloned()?;
        Some(factory.create(view_id))
    }
}

/// Host-plugin shim following the activity lifecycle.
pub struct PlatformPlugin {
    factory: Rc<ViewFactory>,
}

impl PlatformPlugin {
    pub fn new(factory: Rc<ViewFactory>) -> Self {
        Self { factory }
    }

    pub fn on_attached_to_activity(&self, registry: &ViewRegistry) {
        registry.register(VIEW_TYPE, Rc::clone(&self.factory));
    }

    /// Configuration change: same as a fresh attachment.
    pub fn on_reattached_to_activity(&self, registry: &ViewRegistry) {
        self.on_attached_to_activity(registry);
    }

    pub fn on_detached_from_activity(&self, registry: &ViewRegistry) {
        registry.unregister(VIEW_TYPE);
    }
}
