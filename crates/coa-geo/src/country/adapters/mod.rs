//! Builtin country adapters.

mod fra;
mod ita;
mod usa;

pub use fra::france;
pub use ita::italy;
pub use usa::united_states;

/// Left-pads purely numeric codes with zeros to `width`.
fn pad_code(code: &mut String, width: usize) {
    if code.chars().all(|c| c.is_ascii_digit()) && code.len() < width {
        *code = format!("{code:0>width$}");
    }
}
