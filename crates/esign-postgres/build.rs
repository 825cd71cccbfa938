#![forbid(unsafe_code)]

/// Due to limitations in Rust's proc-macro API, there is currently no way to
/// signal that a specific procedural macro should be rerun if
/// an external file changes or is added.
///
/// `embed_migrations!` therefore cannot pick up edits to the SQL files in
/// `./src/migrations` on its own, so the crate is rebuilt whenever that
/// directory changes.
fn main() {
    println!("cargo:rerun-if-changed=./src/migrations");
}
