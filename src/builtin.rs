//! Workflows shipped with the binary

/// The sdt-python workflow: conda provisioning, two flake8 passes and
/// pytest on Linux, macOS and Windows.
pub const SDT_PYTHON_WORKFLOW: &str = include_str!("../workflows/sdt-python.yml");

/// Names of the shipped workflows
pub fn names() -> &'static [&'static str] {
    &["sdt-python"]
}

/// Source of a shipped workflow by name
pub fn source(name: &str) -> Option<&'static str> {
    match name {
        "sdt-python" => Some(SDT_PYTHON_WORKFLOW),
        _ => None,
    }
}
