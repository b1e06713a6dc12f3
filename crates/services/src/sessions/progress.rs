/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub position: usize,
    pub answered: usize,
    pub remaining: usize,
    pub mastered_categories: usize,
    pub is_complete: bool,
}
