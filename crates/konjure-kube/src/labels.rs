//! Recommended label keys
//!
//! See <https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/>

/// Name of the application
pub const APP_NAME: &str = "app.kubernetes.io/name";
/// Unique name identifying the instance of an application
pub const APP_INSTANCE: &str = "app.kubernetes.io/instance";
/// Current version of the application
pub const APP_VERSION: &str = "app.kubernetes.io/version";
/// Component within the architecture
pub const APP_COMPONENT: &str = "app.kubernetes.io/component";
/// Name of the higher level application this one is part of
pub const APP_PART_OF: &str = "app.kubernetes.io/part-of";
/// Tool used to manage the application
pub const APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
/// Controller or user who created the resource
pub const APP_CREATED_BY: &str = "app.kubernetes.io/created-by";

/// Chart name and version set by Helm charts (`<name>-<version>`)
pub const HELM_CHART: &str = "helm.sh/chart";
