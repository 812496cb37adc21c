/// How a token that references several EVSEs is bound to one of them.
/// Only plug-in driven selection is supported.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionAlgorithm {
    #[default]
    PlugEvents,
}
