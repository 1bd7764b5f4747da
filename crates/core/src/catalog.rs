//! Predefined assessment content.
//!
//! Both lists are fixed at process start and presented strictly in order.

use std::collections::HashSet;

use thiserror::Error;

use crate::model::{AssessmentItem, CellRef, Difficulty, ItemId, Question, Task};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("an assessment needs at least one item")]
    Empty,
    #[error("item id {0} appears more than once")]
    DuplicateId(ItemId),
}

/// Reject empty lists and repeated ids.
///
/// # Errors
///
/// Returns `CatalogError` when the list cannot back a session.
pub fn validate_items<I: AssessmentItem>(items: &[I]) -> Result<(), CatalogError> {
    if items.is_empty() {
        return Err(CatalogError::Empty);
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(CatalogError::DuplicateId(item.id()));
        }
    }
    Ok(())
}

#[must_use]
pub fn default_questions() -> Vec<Question> {
    vec![
        Question::new(
            ItemId::new(1),
            "Explain the difference between VLOOKUP and INDEX/MATCH, and when you would prefer one over the other.",
            "VLOOKUP searches the first column of a range and returns a value from a column to the right; \
             INDEX/MATCH can look left, survives column insertions and is usually faster on large ranges.",
        ),
        Question::new(
            ItemId::new(2),
            "What is the difference between relative, absolute and mixed cell references? Give an example of each.",
            "Relative references (A1) shift when copied, absolute references ($A$1) never shift, \
             mixed references ($A1 or A$1) lock only the column or only the row.",
        ),
        Question::new(
            ItemId::new(3),
            "Describe how you would build a pivot table that summarizes total revenue by region and product.",
            "Select the data, insert a PivotTable, place Region in Rows, Product in Columns and \
             Revenue in Values summarized by Sum.",
        ),
        Question::new(
            ItemId::new(4),
            "How would you highlight every value in a column that is above the column's average?",
            "Use Conditional Formatting with the 'Above Average' rule or a formula rule such as =A2>AVERAGE($A$2:$A$100).",
        ),
        Question::new(
            ItemId::new(5),
            "A lookup formula returns #N/A for some rows. How do you handle this so the sheet shows a friendly value?",
            "Wrap the lookup in IFNA or IFERROR, e.g. =IFNA(VLOOKUP(...), \"Not found\"), after checking for \
             trailing spaces or mismatched data types.",
        ),
    ]
}

#[must_use]
pub fn default_tasks() -> Vec<Task> {
    vec![
        Task::new(
            ItemId::new(101),
            "In cell E2, calculate the revenue for the first row (Units multiplied by Unit Price).",
            "=C2*D2",
            CellRef::new(4, 1),
            120,
            Difficulty::Beginner,
        ),
        Task::new(
            ItemId::new(102),
            "In cell C7, calculate the total number of units sold across all rows.",
            "=SUM(C2:C6)",
            CellRef::new(2, 6),
            90,
            Difficulty::Beginner,
        ),
        Task::new(
            ItemId::new(103),
            "In cell D7, calculate the average unit price.",
            "=AVERAGE(D2:D6)",
            CellRef::new(3, 6),
            120,
            Difficulty::Intermediate,
        ),
        Task::new(
            ItemId::new(104),
            "In cell B9, count how many rows belong to the North region.",
            "=COUNTIF(A2:A6,\"North\")",
            CellRef::new(1, 8),
            150,
            Difficulty::Intermediate,
        ),
        Task::new(
            ItemId::new(105),
            "In cell F2, label the row \"High\" when units exceed 100, otherwise \"Low\".",
            "=IF(C2>100,\"High\",\"Low\")",
            CellRef::new(5, 1),
            180,
            Difficulty::Advanced,
        ),
    ]
}
