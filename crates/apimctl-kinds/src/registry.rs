// SPDX-License-Identifier: MIT OR Apache-2.0
//! The 22-kind registry, in canonical deployment order. Creates and
//! updates are applied in this order; deletes run in the reverse of it,
//! so that edges are removed before the resources they point at and
//! resources are created before the edges that reference them.

use apimctl_core::Artifact;

use crate::api::ApiKind;
use crate::association::{AssociationKind, AssociationSpec};
use crate::kind::Kind;
use crate::nested::{ApiDiagnosticKind, ApiOperationPolicyKind};
use crate::policy_xml::{PolicyXmlKind, PolicyXmlSpec};
use crate::scalar::ScalarKind;
use crate::service_policy::ServicePolicyKind;

fn empty_payload() -> serde_json::Value {
    serde_json::json!({})
}

fn gateway_api_payload() -> serde_json::Value {
    serde_json::json!({ "properties": { "provisioningState": "created" } })
}

/// Builds the full registry in the order creates and updates must run.
/// Reverse it to get delete order.
pub fn registry() -> Vec<Box<dyn Kind>> {
    vec![
        Box::new(ScalarKind::new("named_value", "namedValues")),
        Box::new(ScalarKind::new("gateway", "gateways").with_info_file("gatewayInformation.json")),
        Box::new(ScalarKind::new("tag", "tags")),
        Box::new(ScalarKind::new("version_set", "apiVersionSets").with_info_file("versionSetInformation.json")),
        Box::new(ScalarKind::new("backend", "backends")),
        Box::new(ScalarKind::new("logger", "loggers")),
        Box::new(ScalarKind::new("diagnostic", "diagnostics")),
        Box::new(
            ScalarKind::new("policy_fragment", "policyFragments")
                .with_info_file("policyFragmentInformation.json")
                .write_as_directory()
                .externalize_field("policy", "policy.xml"),
        ),
        Box::new(ServicePolicyKind),
        Box::new(
            ScalarKind::new("product", "products")
                .with_info_file("productInformation.json")
                .write_as_directory()
                .strip_payload_fields(&["groups", "apis"]),
        ),
        Box::new(ScalarKind::new("group", "groups")),
        Box::new(ApiKind),
        Box::new(
            ScalarKind::new("subscription", "subscriptions")
                .with_info_file("subscriptionInformation.json")
                .directory_only(),
        ),
        Box::new(PolicyXmlKind(PolicyXmlSpec {
            name: "api_policy",
            parent_segment: "apis",
            parent_info_filenames: &["apiInformation.json", "configuration.json"],
            rest_suffix: "policies/policy",
            parent_dir_by_suffix: true,
        })),
        Box::new(AssociationKind(AssociationSpec {
            name: "api_tag",
            parent_segment: "apis",
            parent_info_filenames: &["apiInformation.json", "configuration.json"],
            child_segment: "tags",
            sidecar_filename: "tags.json",
            inline_field: "tags",
            parent_field: "apiId",
            child_field: "tagId",
            parent_dir_by_suffix: true,
            require_parent_info: true,
            rest_payload: empty_payload,
        })),
        Box::new(ApiDiagnosticKind),
        Box::new(AssociationKind(AssociationSpec {
            name: "gateway_api",
            parent_segment: "gateways",
            parent_info_filenames: &["gatewayInformation.json"],
            child_segment: "apis",
            sidecar_filename: "apis.json",
            inline_field: "apis",
            parent_field: "gatewayId",
            child_field: "apiId",
            parent_dir_by_suffix: false,
            require_parent_info: false,
            rest_payload: gateway_api_payload,
        })),
        Box::new(PolicyXmlKind(PolicyXmlSpec {
            name: "product_policy",
            parent_segment: "products",
            parent_info_filenames: &["productInformation.json"],
            rest_suffix: "policies/policy",
            parent_dir_by_suffix: false,
        })),
        Box::new(AssociationKind(AssociationSpec {
            name: "product_group",
            parent_segment: "products",
            parent_info_filenames: &["productInformation.json"],
            child_segment: "groups",
            sidecar_filename: "groups.json",
            inline_field: "groups",
            parent_field: "productId",
            child_field: "groupId",
            parent_dir_by_suffix: false,
            require_parent_info: true,
            rest_payload: empty_payload,
        })),
        Box::new(AssociationKind(AssociationSpec {
            name: "product_tag",
            parent_segment: "products",
            parent_info_filenames: &["productInformation.json"],
            child_segment: "tags",
            sidecar_filename: "tags.json",
            inline_field: "tags",
            parent_field: "productId",
            child_field: "tagId",
            parent_dir_by_suffix: false,
            require_parent_info: true,
            rest_payload: empty_payload,
        })),
        Box::new(AssociationKind(AssociationSpec {
            name: "product_api",
            parent_segment: "products",
            parent_info_filenames: &["productInformation.json"],
            child_segment: "apis",
            sidecar_filename: "apis.json",
            inline_field: "apis",
            parent_field: "productId",
            child_field: "apiId",
            parent_dir_by_suffix: false,
            require_parent_info: true,
            rest_payload: empty_payload,
        })),
        Box::new(ApiOperationPolicyKind),
    ]
}

/// Looks up a single kind by its registry name, e.g. for `--only`
/// filtering. `None` if no kind carries that name.
pub fn find(name: &str) -> Option<Box<dyn Kind>> {
    registry().into_iter().find(|k| k.name() == name)
}

/// Every registry name, in deployment order. Mirrors [`registry`] without
/// constructing the kinds themselves, for `--only` validation and help text.
pub fn names() -> Vec<&'static str> {
    registry().iter().map(|k| k.name()).collect()
}

/// Sorts artifacts by deployment order of their kind, tie-broken by id.
/// Used by the differ/planner to present changes in a deterministic,
/// dependency-respecting sequence.
pub fn deployment_rank(kind: &str) -> Option<usize> {
    names().iter().position(|n| *n == kind)
}

pub fn sort_by_deploy_order(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        let rank_a = deployment_rank(&a.kind).unwrap_or(usize::MAX);
        let rank_b = deployment_rank(&b.kind).unwrap_or(usize::MAX);
        rank_a.cmp(&rank_b).then_with(|| a.id.cmp(&b.id))
    });
}
