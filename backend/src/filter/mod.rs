//! Year / department filter stage.
//!
//! Filtering borrows: the loaded tables are never copied or mutated, the
//! result is a `Vec` of references into them.

use crate::error::QueryError;
use crate::models::{
    DeathRecord, DepartmentFilter, DepartmentKey, MonthlyMortality, MortalityTotal,
    PopulationRecord, YearSelection,
};

/// A row that can be restricted by year and department.
pub trait Filterable {
    fn year(&self) -> i32;
    fn department(&self) -> &DepartmentKey;
}

macro_rules! impl_filterable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Filterable for $ty {
                fn year(&self) -> i32 {
                    self.year
                }

                fn department(&self) -> &DepartmentKey {
                    &self.department
                }
            }
        )+
    };
}

impl_filterable!(DeathRecord, MortalityTotal, MonthlyMortality, PopulationRecord);

/// Active filter for one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub years: YearSelection,
    pub department: DepartmentFilter,
}

impl Filter {
    pub fn new(years: YearSelection, department: DepartmentFilter) -> Self {
        Self { years, department }
    }

    pub fn matches<T: Filterable>(&self, row: &T) -> bool {
        self.years.contains(row.year()) && self.department.matches(row.department())
    }

    pub fn apply<'a, T: Filterable>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter().filter(|row| self.matches(*row)).collect()
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(YearSelection::All, DepartmentFilter::All)
    }
}

/// Restrict mortality and population rows to `[year_start, year_end]` and,
/// unless `department` is [`DepartmentFilter::All`], to one department.
pub fn filter<'m, 'p, M, P>(
    mortality: &'m [M],
    population: &'p [P],
    year_start: i32,
    year_end: i32,
    department: &DepartmentFilter,
) -> Result<(Vec<&'m M>, Vec<&'p P>), QueryError>
where
    M: Filterable,
    P: Filterable,
{
    let filter = Filter::new(YearSelection::range(year_start, year_end)?, department.clone());
    Ok((filter.apply(mortality), filter.apply(population)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(dept: &str, year: i32, deaths: u64) -> MortalityTotal {
        MortalityTotal { department: DepartmentKey::from_name(dept), year, deaths }
    }

    fn pop(dept: &str, year: i32, women: f64) -> PopulationRecord {
        PopulationRecord { department: DepartmentKey::from_name(dept), year, women }
    }

    #[test]
    fn test_filter_by_inclusive_year_range() {
        let mortality = vec![total("Antioquia", 2014, 1), total("Antioquia", 2015, 2), total("Caldas", 2020, 3), total("Caldas", 2021, 4)];
        let population = vec![pop("Antioquia", 2015, 10.0), pop("Caldas", 2021, 20.0)];

        let (m, p) = filter(&mortality, &population, 2015, 2020, &DepartmentFilter::All).unwrap();

        assert_eq!(m.iter().map(|r| r.deaths).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].year, 2015);
    }

    #[test]
    fn test_filter_by_department() {
        let mortality = vec![total("Antioquia", 2020, 1), total("Caldas", 2020, 3)];
        let population = vec![pop("ANTIOQUIA", 2020, 10.0), pop("Caldas", 2020, 20.0)];
        let only = DepartmentFilter::parse("antioquia");

        let (m, p) = filter(&mortality, &population, 2020, 2020, &only).unwrap();

        assert_eq!(m.len(), 1);
        assert_eq!(m[0].deaths, 1);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].women, 10.0);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let mortality = vec![total("Antioquia", 2020, 1)];
        let population: Vec<PopulationRecord> = Vec::new();

        let (m, p) = filter(&mortality, &population, 1990, 1995, &DepartmentFilter::All).unwrap();
        assert!(m.is_empty());
        assert!(p.is_empty());
    }

    #[test]
    fn test_reversed_range_rejected() {
        let rows: Vec<MortalityTotal> = Vec::new();
        let err = filter(&rows, &rows, 2021, 2020, &DepartmentFilter::All).unwrap_err();
        assert_eq!(err, QueryError::InvalidYearRange { start: 2021, end: 2020 });
    }

    #[test]
    fn test_filter_is_pure() {
        let mortality = vec![total("Antioquia", 2020, 1), total("Caldas", 2019, 3)];
        let f = Filter::new(YearSelection::Single(2020), DepartmentFilter::All);

        let first = f.apply(&mortality);
        let second = f.apply(&mortality);
        assert_eq!(first, second);
        assert_eq!(mortality.len(), 2);
    }
}
