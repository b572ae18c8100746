//! Column sort state

use lg_core::record::{FieldKey, Record};
use lg_core::SortDirection;

/// The column the grid is sorted by, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState<F> {
    current: Option<(F, SortDirection)>,
}

impl<F: FieldKey> Default for SortState<F> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<F: FieldKey> SortState<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header click: the active column flips direction, any other column
    /// becomes active ascending
    pub fn set_sort(&mut self, column: F) {
        self.current = match self.current {
            Some((active, direction)) if active == column => Some((active, direction.toggled())),
            _ => Some((column, SortDirection::Ascending)),
        };
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn column(&self) -> Option<F> {
        self.current.map(|(column, _)| column)
    }

    pub fn direction(&self) -> Option<SortDirection> {
        self.current.map(|(_, direction)| direction)
    }

    /// Sort clause for a remote query
    pub fn as_query_sort(&self) -> Option<(F, SortDirection)> {
        self.current
    }

    /// A freshly ordered copy of `records`.
    ///
    /// With no active column the input order is kept. The sort is stable,
    /// so ties keep their fetch order.
    pub fn sorted_view<R>(&self, records: &[R]) -> Vec<R>
    where
        R: Record<Field = F>,
    {
        let mut view = records.to_vec();
        if let Some((column, direction)) = self.current {
            view.sort_by(|a, b| {
                let ordering = a.value(column).compare(&b.value(column));
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lg_core::{Lead, LeadField, NewLead};
    use uuid::Uuid;

    fn leads(names: &[(&str, Option<&str>)]) -> Vec<Lead> {
        let org = Uuid::new_v4();
        names
            .iter()
            .map(|(last, company)| {
                let mut draft = NewLead::new("Test", *last).with_phone("555 0100 200");
                draft.company_name = company.map(str::to_string);
                Lead::from_draft(Uuid::new_v4(), org, draft, Utc::now())
            })
            .collect()
    }

    fn last_names(view: &[Lead]) -> Vec<&str> {
        view.iter().map(|l| l.last_name.as_str()).collect()
    }

    #[test]
    fn test_set_sort_toggles_same_column() {
        let mut sort = SortState::new();
        sort.set_sort(LeadField::LastName);
        assert_eq!(sort.direction(), Some(SortDirection::Ascending));
        sort.set_sort(LeadField::LastName);
        assert_eq!(sort.direction(), Some(SortDirection::Descending));
        sort.set_sort(LeadField::Email);
        assert_eq!(sort.as_query_sort(), Some((LeadField::Email, SortDirection::Ascending)));
    }

    #[test]
    fn test_sorted_view_does_not_mutate_input() {
        let records = leads(&[("turing", None), ("Hopper", None), ("lovelace", None)]);
        let mut sort = SortState::new();
        sort.set_sort(LeadField::LastName);
        let view = sort.sorted_view(&records);
        assert_eq!(last_names(&view), vec!["Hopper", "lovelace", "turing"]);
        assert_eq!(last_names(&records), vec!["turing", "Hopper", "lovelace"]);
    }

    #[test]
    fn test_double_toggle_round_trips() {
        let records = leads(&[("Dijkstra", None), ("Backus", None), ("Knuth", None), ("Allen", None)]);
        let mut sort = SortState::new();
        sort.set_sort(LeadField::LastName);
        let original = sort.sorted_view(&records);

        sort.set_sort(LeadField::LastName);
        let flipped = sort.sorted_view(&records);
        assert_eq!(last_names(&flipped), vec!["Knuth", "Dijkstra", "Backus", "Allen"]);

        sort.set_sort(LeadField::LastName);
        assert_eq!(sort.sorted_view(&records), original);
    }

    #[test]
    fn test_missing_values_sort_lowest() {
        let records = leads(&[("A", Some("Zeta")), ("B", None), ("C", Some("alpha"))]);
        let mut sort = SortState::new();
        sort.set_sort(LeadField::CompanyName);
        assert_eq!(last_names(&sort.sorted_view(&records)), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_no_column_keeps_fetch_order() {
        let records = leads(&[("b", None), ("a", None)]);
        let sort = SortState::<LeadField>::new();
        assert_eq!(last_names(&sort.sorted_view(&records)), vec!["b", "a"]);
    }
}
