//! Windows Firewall rule store backed by `INetFwPolicy2`
//!
//! The COM interface wrappers from the `windows` crate release their
//! reference on drop, so every handle acquired here (policy, rule
//! collection, enumerator, individual rules) is released on every return
//! path. COM itself is initialized by
//! [`StoreSession`](crate::core::store::StoreSession).

use crate::core::error::{Error, Result};
use crate::core::rule::{Action, Direction, RuleSpec, StoreRule};
use crate::core::store::RuleStore;
use crate::utils::{from_wide, to_wide};
use tracing::{debug, trace};
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, VARIANT_FALSE, VARIANT_TRUE};
use windows::Win32::NetworkManagement::WindowsFirewall::{
    INetFwPolicy2, INetFwRule, INetFwRules, NET_FW_ACTION, NET_FW_ACTION_ALLOW,
    NET_FW_ACTION_BLOCK, NET_FW_RULE_DIR_IN, NET_FW_RULE_DIR_OUT, NET_FW_RULE_DIRECTION,
    NetFwPolicy2, NetFwRule,
};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize,
};
use windows::Win32::System::Ole::IEnumVARIANT;
use windows::core::{BSTR, IUnknown, Interface, VARIANT};

pub(crate) fn com_initialize() -> Result<()> {
    // S_FALSE (already initialized on this thread) still needs a matching uninitialize
    unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
        .ok()
        .map_err(|e| Error::Initialization(format!("CoInitializeEx failed: {e}")))
}

pub(crate) fn com_uninitialize() {
    unsafe { CoUninitialize() };
}

fn store_error(operation: impl Into<String>, e: &windows::core::Error) -> Error {
    let operation = operation.into();
    let message = e.message();
    if message.is_empty() {
        Error::UnknownStore(format!("{operation} ({:#010x})", e.code().0))
    } else {
        Error::rule_store(operation, format!("{message} ({:#010x})", e.code().0))
    }
}

fn to_bstr(value: &str) -> BSTR {
    BSTR::from_wide(&to_wide(value))
}

fn direction_to_raw(direction: Direction) -> NET_FW_RULE_DIRECTION {
    match direction {
        Direction::In => NET_FW_RULE_DIR_IN,
        Direction::Out => NET_FW_RULE_DIR_OUT,
    }
}

fn direction_from_raw(raw: NET_FW_RULE_DIRECTION) -> Option<Direction> {
    if raw == NET_FW_RULE_DIR_IN {
        Some(Direction::In)
    } else if raw == NET_FW_RULE_DIR_OUT {
        Some(Direction::Out)
    } else {
        None
    }
}

fn action_to_raw(action: Action) -> NET_FW_ACTION {
    match action {
        Action::Allow => NET_FW_ACTION_ALLOW,
        Action::Block => NET_FW_ACTION_BLOCK,
    }
}

/// Handle to the host firewall policy and its rule collection
pub struct WindowsFirewallStore {
    _policy: INetFwPolicy2,
    rules: INetFwRules,
}

impl WindowsFirewallStore {
    /// Acquires the firewall policy object
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the policy object cannot be
    /// created or its rule collection cannot be obtained.
    pub fn open() -> Result<Self> {
        let policy: INetFwPolicy2 =
            unsafe { CoCreateInstance(&NetFwPolicy2, None, CLSCTX_INPROC_SERVER) }.map_err(
                |e| Error::StoreUnavailable(format!("CoCreateInstance(NetFwPolicy2) failed: {e}")),
            )?;
        let rules = unsafe { policy.Rules() }
            .map_err(|e| Error::StoreUnavailable(format!("INetFwPolicy2::Rules failed: {e}")))?;

        debug!("Acquired INetFwPolicy2");
        Ok(Self {
            _policy: policy,
            rules,
        })
    }

    fn read_rule(rule: &INetFwRule) -> Result<StoreRule> {
        let name = unsafe { rule.Name() }.map_err(|e| store_error("reading rule name", &e))?;
        let application = unsafe { rule.ApplicationName() }
            .map_err(|e| store_error("reading rule application", &e))?;
        let direction = unsafe { rule.Direction() }
            .ok()
            .and_then(direction_from_raw);

        Ok(StoreRule {
            name: from_wide(name.as_wide())?,
            application: from_wide(application.as_wide())?,
            direction,
        })
    }
}

impl RuleStore for WindowsFirewallStore {
    fn rules(&self) -> Result<Vec<StoreRule>> {
        let enumerator: IEnumVARIANT = unsafe { self.rules._NewEnum() }
            .and_then(|unknown| unknown.cast())
            .map_err(|e| store_error("getting rules", &e))?;

        let mut result = Vec::new();
        loop {
            let mut slot = [VARIANT::default()];
            let mut fetched = 0u32;
            unsafe { enumerator.Next(&mut slot, &mut fetched) }
                .ok()
                .map_err(|e| store_error("getting rules", &e))?;
            if fetched == 0 {
                break;
            }

            let rule: INetFwRule = IUnknown::try_from(&slot[0])
                .and_then(|unknown| unknown.cast())
                .map_err(|e| store_error("getting rules", &e))?;
            result.push(Self::read_rule(&rule)?);
        }

        trace!("Enumerated {} firewall rule(s)", result.len());
        Ok(result)
    }

    fn add_rule(&mut self, spec: &RuleSpec) -> Result<()> {
        let operation = format!("adding rule {}", spec.name);
        let rule: INetFwRule = unsafe { CoCreateInstance(&NetFwRule, None, CLSCTX_INPROC_SERVER) }
            .map_err(|e| store_error(operation.as_str(), &e))?;

        let configure_and_add = || -> windows::core::Result<()> {
            unsafe {
                rule.SetName(&to_bstr(&spec.name))?;
                rule.SetApplicationName(&to_bstr(&spec.application))?;
                rule.SetDescription(&to_bstr(&spec.description))?;
                rule.SetDirection(direction_to_raw(spec.direction))?;
                rule.SetAction(action_to_raw(spec.action))?;
                rule.SetEnabled(if spec.enabled {
                    VARIANT_TRUE
                } else {
                    VARIANT_FALSE
                })?;
                self.rules.Add(&rule)
            }
        };
        configure_and_add().map_err(|e| store_error(operation.as_str(), &e))
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        unsafe { self.rules.Remove(&to_bstr(name)) }.map_err(|e| {
            if e.code() == ERROR_FILE_NOT_FOUND.to_hresult() {
                Error::RuleNotFound(name.to_string())
            } else {
                store_error(format!("removing rule {name}"), &e)
            }
        })
    }
}
