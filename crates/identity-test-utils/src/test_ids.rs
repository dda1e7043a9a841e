//! Fixed test IDs for deterministic tests
//!
//! All test IDs are deterministic to ensure reproducible test results.
//! Using fixed UUIDs prevents flaky tests caused by random data.

use uuid::Uuid;

// Admin IDs (100-199)
pub const TEST_ADMIN_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_ADMIN_BOB: Uuid = Uuid::from_u128(101);
pub const TEST_ADMIN_DEACTIVATED: Uuid = Uuid::from_u128(102);

// System IDs (200-299)
pub const TEST_SYSTEM_BILLING: Uuid = Uuid::from_u128(200);
pub const TEST_SYSTEM_REPORTING: Uuid = Uuid::from_u128(201);

// Organization IDs (1000-1099)
pub const TEST_ORG_XINCHUAN: Uuid = Uuid::from_u128(1000);

// Provider subject ids as the upstream providers report them
pub const TEST_XINCHUAN_SUBJECT_ALICE: &str = "4242";
pub const TEST_MOBILE_SUBJECT_BOB: &str = "mb-0007";
pub const TEST_XINCHUAN_SUBJECT_DEACTIVATED: &str = "4343";

// System secret keys
pub const TEST_SYSTEM_SECRET: &str = "test-secret-do-not-use-in-production";

// Identity provider credentials
pub const TEST_XINCHUAN_CLIENT_ID: &str = "dashboard-test-client";
pub const TEST_XINCHUAN_CLIENT_SECRET: &str = "dashboard-test-secret";
pub const TEST_XINCHUAN_CALLBACK: &str = "https://admin.test/callback";
pub const TEST_MOBILE_BACKEND_SECRET: &str = "mobile-backend-test-secret";

// Authorization artifacts accepted by the mocked providers
pub const TEST_AUTH_CODE_ALICE: &str = "auth-code-alice";
pub const TEST_DEVICE_TOKEN_BOB: &str = "device-token-bob";
