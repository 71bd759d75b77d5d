/// The policy an [`ErrorHandler`][crate::template::Node::ErrorHandler] node
/// applies when its inner template fails to match.
///
/// Only one concrete policy, `Nullable`, is implemented today; the enum is
/// left open so a future policy (e.g. a caller-supplied default value) can
/// be added without changing the `Node` shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// On failure, bind every outer symbol of the inner template to `null`
    /// and synthesize a null row in every table the inner template opens.
    Nullable,
}
