/// Turns the full accumulated answer text into something displayable.
///
/// Implementations must be pure: the same input always yields the same
/// output, so the whole buffer can be re-rendered after every delta.
pub trait Render {
    type Tree;

    fn render(&self, full_text: &str) -> Self::Tree;
}
