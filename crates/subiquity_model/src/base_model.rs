//! `InstallModel`, the process-wide aggregate (spec.md §3 "InstallModel
//! (base model)").

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::Notify;

use crate::controller::Controller;
use crate::submodels::{
    debconf::DebconfModel, filesystem::FilesystemModel, identity::IdentityModel,
    keyboard::KeyboardModel, locale::LocaleModel, mirror::MirrorModel, network::NetworkModel,
    proxy::ProxyModel, snaplist::SnaplistModel, source::SourceModel, ssh::SshModel,
    timezone::TimezoneModel,
};

/// Controllers gated before curtin runs (spec.md §4.4 "Stage gating").
pub const INSTALL_STAGE_CONTROLLERS: &[&str] = &[
    "filesystem",
    "keyboard",
    "mirror",
    "network",
    "proxy",
    "source",
    "debconf",
    "kernel",
];

/// Controllers gated after curtin runs, before late-commands.
pub const POSTINSTALL_STAGE_CONTROLLERS: &[&str] = &[
    "identity",
    "locale",
    "packages",
    "snaplist",
    "ssh",
    "timezone",
    "userdata",
];

/// A named set of boolean events with monotone set→set transitions
/// (spec.md §3 Invariant: "stage transitions fire only when every event in
/// the active set is set"; §5 "Deadlock avoidance": each event has at most
/// one setter).
pub struct EventSet {
    flags: Mutex<HashMap<String, bool>>,
    notify: Notify,
}

impl EventSet {
    pub fn new(names: impl IntoIterator<Item = &'static str>) -> Self {
        let flags = names.into_iter().map(|n| (n.to_string(), false)).collect();
        Self {
            flags: Mutex::new(flags),
            notify: Notify::new(),
        }
    }

    /// `configured(name)`: idempotent, monotone set.
    pub fn set(&self, name: &str) {
        let mut flags = self.flags.lock().unwrap();
        if let Some(flag) = flags.get_mut(name) {
            if !*flag {
                *flag = true;
                self.notify.notify_waiters();
            }
        }
    }

    pub fn is_set(&self, name: &str) -> bool {
        *self.flags.lock().unwrap().get(name).unwrap_or(&false)
    }

    fn all_set(&self) -> bool {
        self.flags.lock().unwrap().values().all(|v| *v)
    }

    /// Blocks until every event in this set has been set at least once.
    pub async fn wait_all(&self) {
        loop {
            if self.all_set() {
                return;
            }
            let notified = self.notify.notified();
            if self.all_set() {
                return;
            }
            notified.await;
        }
    }
}

/// A single event with the same monotone-set discipline as `EventSet`, used
/// for the install confirmation gate (spec.md §4.5 "Confirmation").
pub struct SingleEvent {
    flag: Mutex<bool>,
    notify: Notify,
}

impl Default for SingleEvent {
    fn default() -> Self {
        Self {
            flag: Mutex::new(false),
            notify: Notify::new(),
        }
    }
}

impl SingleEvent {
    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap();
        if !*flag {
            *flag = true;
            self.notify.notify_waiters();
        }
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap()
    }

    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// The base model: exclusively owns every sub-model (spec.md §3
/// "Ownership").
///
/// Each sub-model is behind its own `Mutex` rather than the struct as a
/// whole: the install task waits on `install_events`/`postinstall_events`
/// for possibly minutes at a time, and that wait must never be blocked
/// behind a lock a controller's endpoint handler also needs to report
/// `configured()` (spec.md §5 "Deadlock avoidance").
pub struct InstallModel {
    pub filesystem: Mutex<FilesystemModel>,
    pub identity: Mutex<IdentityModel>,
    pub keyboard: Mutex<KeyboardModel>,
    pub locale: Mutex<LocaleModel>,
    pub mirror: Mutex<MirrorModel>,
    pub network: Mutex<NetworkModel>,
    pub proxy: Mutex<ProxyModel>,
    pub snaplist: Mutex<SnaplistModel>,
    pub source: Mutex<SourceModel>,
    pub ssh: Mutex<SshModel>,
    pub timezone: Mutex<TimezoneModel>,
    pub debconf: Mutex<DebconfModel>,

    pub install_events: EventSet,
    pub postinstall_events: EventSet,
    pub confirmation_event: SingleEvent,
}

impl Default for InstallModel {
    fn default() -> Self {
        Self {
            filesystem: Mutex::new(FilesystemModel::default()),
            identity: Mutex::new(IdentityModel::default()),
            keyboard: Mutex::new(KeyboardModel::default()),
            locale: Mutex::new(LocaleModel::default()),
            mirror: Mutex::new(MirrorModel::default()),
            network: Mutex::new(NetworkModel::default()),
            proxy: Mutex::new(ProxyModel::default()),
            snaplist: Mutex::new(SnaplistModel::default()),
            source: Mutex::new(SourceModel::default()),
            ssh: Mutex::new(SshModel::default()),
            timezone: Mutex::new(TimezoneModel::default()),
            debconf: Mutex::new(DebconfModel::default()),
            install_events: EventSet::new(INSTALL_STAGE_CONTROLLERS.iter().copied()),
            postinstall_events: EventSet::new(POSTINSTALL_STAGE_CONTROLLERS.iter().copied()),
            confirmation_event: SingleEvent::default(),
        }
    }
}

/// Drives one controller through the settle sequence: load its autoinstall
/// slice (if any), apply it when the section isn't interactive, then report
/// `configured()` against the base model's stage gates. `std::mem::take`
/// pulls the sub-model out from behind its `Mutex` for the duration, so the
/// lock is never held across `apply_autoinstall_config`'s `.await`.
macro_rules! settle_controller {
    ($self:ident, $field:ident, $doc:ident) => {{
        let name = stringify!($field);
        let mut local = std::mem::take(&mut *$self.$field.lock().unwrap());
        crate::controller::setup_autoinstall(&mut local, $doc)?;
        if !crate::controller::is_interactive(&local, $doc) {
            local.apply_autoinstall_config().await.map_err(|e| {
                crate::error::AutoinstallError::SliceValidation {
                    key: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        let configured = local.configured();
        *$self.$field.lock().unwrap() = local;
        if configured {
            $self.mark_configured(name);
        }
    }};
}

impl InstallModel {
    /// spec.md §11 `make_autoinstall()` aggregation: `{version: 1, <key>: ...}`
    /// built from every controller's own slice.
    pub fn make_autoinstall(&self, slices: Vec<(&'static str, Value)>) -> Value {
        let mut doc = serde_json::Map::new();
        doc.insert("version".to_string(), Value::from(1));
        for (key, slice) in slices {
            if !slice.is_null() {
                doc.insert(key.to_string(), slice);
            }
        }
        Value::Object(doc)
    }

    /// spec.md §4.4/§4.5: reports a controller configured. Routed through
    /// both stage gates since `EventSet::set` on a name outside its own
    /// list is a no-op, so callers never need to know which stage a given
    /// controller belongs to.
    pub fn mark_configured(&self, name: &str) {
        self.install_events.set(name);
        self.postinstall_events.set(name);
    }

    /// spec.md §4.4 "Interactivity predicate", driven across every
    /// controller at boot: non-interactive controllers settle immediately
    /// from the autoinstall document and report `configured()` themselves,
    /// so `run_install_pipeline`'s wait on `install_events`/
    /// `postinstall_events` only ever blocks on the controllers a client
    /// still has to submit.
    pub async fn settle_controllers(
        &self,
        doc: Option<&subiquity_core::types::AutoinstallDocument>,
    ) -> Result<(), crate::error::AutoinstallError> {
        settle_controller!(self, filesystem, doc);
        settle_controller!(self, keyboard, doc);
        settle_controller!(self, mirror, doc);
        settle_controller!(self, network, doc);
        settle_controller!(self, proxy, doc);
        settle_controller!(self, source, doc);
        settle_controller!(self, debconf, doc);
        settle_controller!(self, identity, doc);
        settle_controller!(self, locale, doc);
        settle_controller!(self, snaplist, doc);
        settle_controller!(self, ssh, doc);
        settle_controller!(self, timezone, doc);
        // "kernel"/"packages"/"userdata" have no configurable sub-model in
        // this workspace (spec.md §1 Non-goals): they never take user
        // input, so they settle unconditionally.
        self.mark_configured("kernel");
        self.mark_configured("packages");
        self.mark_configured("userdata");
        Ok(())
    }
}
