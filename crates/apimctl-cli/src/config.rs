// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arg-resolution chain: turns CLI flags, environment variables, and (for
//! target coordinates only) a previously-initialized state file into the
//! concrete values the command orchestrator needs, in strict priority
//! order. Kept as pure functions, independent of `clap`, so the chain
//! itself is unit-testable without constructing a parsed `Cli`.

use apimctl_core::State;
use apimctl_state::BackendArgs;
use apimctl_transport::{CachingTokenSource, ClientCredentialTokenSource, EnvTokenSource, TokenSource};

#[derive(Debug, Clone, Default)]
pub struct TargetCoordsArgs {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TargetCoords {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

/// Resolves one coordinate value: CLI flag, then environment variable,
/// then (when given) the value already recorded in the state file.
fn resolve_one(cli: Option<&str>, env_var: &str, from_state: Option<&str>) -> Option<String> {
    cli.map(str::to_string)
        .or_else(|| std::env::var(env_var).ok().filter(|s| !s.is_empty()))
        .or_else(|| from_state.map(str::to_string))
}

/// Resolves the three target coordinates (`--subscription-id`,
/// `--resource-group`, `--service-name`) in the priority order spec.md §6
/// describes: CLI flag wins, then the matching `APIM_*` environment
/// variable, then (only here, since no other field falls back this far)
/// whatever is already recorded in an existing state file.
pub fn resolve_target_coords(args: &TargetCoordsArgs, state: Option<&State>) -> Result<TargetCoords, String> {
    let subscription_id = resolve_one(
        args.subscription_id.as_deref(),
        "APIM_SUBSCRIPTION_ID",
        state.map(|s| s.subscription_id.as_str()),
    )
    .ok_or_else(|| "subscription id not resolved: pass --subscription-id or set APIM_SUBSCRIPTION_ID".to_string())?;
    let resource_group = resolve_one(
        args.resource_group.as_deref(),
        "APIM_RESOURCE_GROUP",
        state.map(|s| s.resource_group.as_str()),
    )
    .ok_or_else(|| "resource group not resolved: pass --resource-group or set APIM_RESOURCE_GROUP".to_string())?;
    let service_name = resolve_one(
        args.service_name.as_deref(),
        "APIM_SERVICE_NAME",
        state.map(|s| s.service_name.as_str()),
    )
    .ok_or_else(|| "service name not resolved: pass --service-name or set APIM_SERVICE_NAME".to_string())?;

    Ok(TargetCoords { subscription_id, resource_group, service_name })
}

#[derive(Debug, Clone, Default)]
pub struct BackendFlagArgs {
    pub backend: Option<String>,
    pub state_file: Option<String>,
    pub storage_account: Option<String>,
    pub storage_sas_token: Option<String>,
    pub container: Option<String>,
    pub blob: Option<String>,
}

fn env_opt(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

/// Resolves state-backend selection flags against CLI then environment
/// (no state-file fallback applies here: these flags are how the state
/// file itself is located).
pub fn resolve_backend_args(args: &BackendFlagArgs) -> BackendArgs {
    BackendArgs {
        backend: args.backend.clone().or_else(|| env_opt("APIM_BACKEND")),
        state_file: args
            .state_file
            .clone()
            .or_else(|| env_opt("APIM_STATE_FILE"))
            .map(std::path::PathBuf::from),
        storage_account: args.storage_account.clone().or_else(|| env_opt("APIM_STORAGE_ACCOUNT")),
        storage_sas_token: args
            .storage_sas_token
            .clone()
            .or_else(|| env_opt("APIM_STORAGE_SAS_TOKEN")),
        container: args.container.clone().or_else(|| env_opt("APIM_STORAGE_CONTAINER")),
        blob: args.blob.clone().or_else(|| env_opt("APIM_STORAGE_BLOB")),
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthFlagArgs {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tenant_id: Option<String>,
}

/// Builds the token source the command orchestrator hands to the REST
/// client: a client-credential source when all three auth flags resolve
/// (CLI then environment), otherwise the ambient-credential default that
/// reads a pre-acquired token from the environment.
pub fn build_token_source(args: &AuthFlagArgs, http: reqwest::Client) -> std::sync::Arc<dyn TokenSource> {
    let client_id = args.client_id.clone().or_else(|| env_opt("APIM_CLIENT_ID"));
    let client_secret = args.client_secret.clone().or_else(|| env_opt("APIM_CLIENT_SECRET"));
    let tenant_id = args.tenant_id.clone().or_else(|| env_opt("APIM_TENANT_ID"));

    match (client_id, client_secret, tenant_id) {
        (Some(client_id), Some(client_secret), Some(tenant_id)) => {
            let token_url = format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token");
            std::sync::Arc::new(CachingTokenSource::new(ClientCredentialTokenSource::new(
                http,
                token_url,
                client_id,
                client_secret,
                "https://management.azure.com/.default".to_string(),
            )))
        }
        _ => std::sync::Arc::new(CachingTokenSource::new(EnvTokenSource::new(
            "APIM_ACCESS_TOKEN",
            "APIM_ACCESS_TOKEN_EXPIRY",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_everything() {
        let args = TargetCoordsArgs {
            subscription_id: Some("from-cli".into()),
            resource_group: Some("rg".into()),
            service_name: Some("svc".into()),
        };
        let coords = resolve_target_coords(&args, None).unwrap();
        assert_eq!(coords.subscription_id, "from-cli");
    }

    #[test]
    fn state_file_is_the_last_resort() {
        let state = apimctl_core::empty_state("from-state", "rg", "svc");
        let args = TargetCoordsArgs::default();
        // SAFETY (test-only): clearing env vars this test doesn't set.
        unsafe {
            std::env::remove_var("APIM_SUBSCRIPTION_ID");
        }
        let coords = resolve_target_coords(&args, Some(&state)).unwrap();
        assert_eq!(coords.subscription_id, "from-state");
    }

    #[test]
    fn missing_everywhere_is_an_error() {
        unsafe {
            std::env::remove_var("APIM_SUBSCRIPTION_ID");
        }
        let args = TargetCoordsArgs::default();
        assert!(resolve_target_coords(&args, None).is_err());
    }

    #[test]
    fn backend_args_default_to_local() {
        let resolved = resolve_backend_args(&BackendFlagArgs::default());
        assert!(resolved.backend.is_none() || resolved.backend.as_deref() == Some("local"));
    }
}
