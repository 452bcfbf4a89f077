//! # Constants
//!
//! Well-known keys and controller defaults.
//!
//! Label, annotation, and secret keys are shared with Argo CD, Capsule and the
//! Kubernetes token controller, so their values must stay bit-exact.

/// Label naming the system that manages a dependent object
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`] on every dependent object
pub const MANAGED_BY_VALUE: &str = "capsule-argo-addon";

/// Label naming the tenant a dependent object belongs to
pub const TENANT_LABEL: &str = "argo.addons.projectcapsule.dev/tenant";

/// Prefix of the tenant annotations overriding addon settings
pub const ANNOTATION_PREFIX: &str = "argo.addons.projectcapsule.dev/";

/// Tenant annotation enabling or disabling the proxy registration
pub const PROXY_ANNOTATION: &str = "argo.addons.projectcapsule.dev/proxy";

/// Tenant annotation keeping dependents alive when the tenant is deleted
pub const DECOUPLE_ANNOTATION: &str = "argo.addons.projectcapsule.dev/decouple";

/// Tenant annotation allowing adoption of pre-existing objects
pub const FORCE_ANNOTATION: &str = "argo.addons.projectcapsule.dev/force";

/// Tenant annotation overriding the service account namespace
pub const SERVICE_ACCOUNT_NAMESPACE_ANNOTATION: &str =
    "argo.addons.projectcapsule.dev/service-account-namespace";

/// Finalizer held on live tenants
pub const TENANT_FINALIZER: &str = "argo.addons.projectcapsule.dev/finalizer";

/// Annotation binding a token secret to its service account
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

/// Secret type populated by the Kubernetes token controller
pub const SERVICE_ACCOUNT_TOKEN_SECRET_TYPE: &str = "kubernetes.io/service-account-token";

/// Data key holding the bearer token in a token secret
pub const TOKEN_DATA_KEY: &str = "token";

/// Plain secret type
pub const OPAQUE_SECRET_TYPE: &str = "Opaque";

/// Argo CD label declaring the semantic type of a secret
pub const ARGO_SECRET_TYPE_LABEL: &str = "argocd.argoproj.io/secret-type";

/// Value of [`ARGO_SECRET_TYPE_LABEL`] for cluster registrations
pub const ARGO_SECRET_TYPE_CLUSTER: &str = "cluster";

/// Owner principal kind for service accounts
pub const SERVICE_ACCOUNT_OWNER_KIND: &str = "ServiceAccount";

/// Default name of the `ArgoAddon` object holding the settings
pub const DEFAULT_SETTING_NAME: &str = "default";

/// Default Argo CD namespace
pub const DEFAULT_ARGO_NAMESPACE: &str = "argocd";

/// Default namespace for tenant service accounts
pub const DEFAULT_SERVICE_ACCOUNT_NAMESPACE: &str = "capsule-argo-addon";

/// Default capsule-proxy service name
pub const DEFAULT_CAPSULE_PROXY_SERVICE_NAME: &str = "capsule-proxy";

/// Default capsule-proxy service namespace
pub const DEFAULT_CAPSULE_PROXY_SERVICE_NAMESPACE: &str = "capsule-system";

/// Default capsule-proxy service port
pub const DEFAULT_CAPSULE_PROXY_SERVICE_PORT: u16 = 9001;

/// Default reconciliation pass deadline (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

/// Default periodic resync interval (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default requeue interval after a settings reconciliation error (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 30;

/// Default number of attempts for conflict retries and token polling
pub const DEFAULT_RETRY_STEPS: u32 = 4;

/// Default first retry delay (milliseconds)
pub const DEFAULT_RETRY_INITIAL_MS: u64 = 10;

/// Default retry delay growth factor
pub const DEFAULT_RETRY_FACTOR: f64 = 5.0;

/// Default retry delay cap (milliseconds)
pub const DEFAULT_RETRY_MAX_MS: u64 = 10_000;

/// Default minimum error backoff (minutes)
pub const DEFAULT_ERROR_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default maximum error backoff (minutes)
pub const DEFAULT_ERROR_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default watch restart delay (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default metrics and health server port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default concurrency of tenant reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;
