/*! Integration tests for Cosync.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - bridge: Tests for the string, list, map and undoable list bridges
 * - collaborators: Tests for the collaborator presence map
 * - modeldb: Tests for the document store and its in-memory to network transition
 *
 * The in-memory realtime provider stands in for the network service throughout.
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cosync=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

mod bridge;
mod helpers;
mod modeldb;
