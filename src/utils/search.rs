#![forbid(unsafe_code)]

use crate::utils::poem_types::PoemRecord;

// ---------------------------------------------------------------------------
// search:
// ---------------------------------------------------------------------------
/** Return the records whose title, content, category or location contains
 * the query as a case-insensitive substring.  Input order is preserved.
 *
 * The empty query is a substring of everything, so it returns every record.
 * The search page never calls this with an empty query.
 */
pub fn search(query: &str, records: &[PoemRecord]) -> Vec<PoemRecord> {
    let query = query.to_lowercase();
    records.iter()
        .filter(|r| matches(&query, r))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// matches:
// ---------------------------------------------------------------------------
// The query must already be folded.
fn matches(folded_query: &str, record: &PoemRecord) -> bool {
    [&record.title, &record.content, &record.category, &record.location]
        .iter()
        .any(|field| field.to_lowercase().contains(folded_query))
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> Vec<PoemRecord> {
        vec![
            PoemRecord::new(1, "Static".into(), "2023-04-02".into(), "Poetry".into(),
                            "Detroit, MI".into(), "noise and hum".into()),
            PoemRecord::new(2, "Echo".into(), "2024-11-19".into(), "Poetry".into(),
                            "Brooklyn, NY".into(), "silence".into()),
            PoemRecord::new(3, "Tidal".into(), "2025-01-07".into(), "Draft".into(),
                            "Kauai".into(), "salt\nwash\nlight".into()),
        ]
    }

    fn ids(records: &[PoemRecord]) -> Vec<u32> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn matches_content_substring() {
        assert_eq!(ids(&search("noise", &fixtures())), vec![1]);
        assert_eq!(ids(&search("hum", &fixtures())), vec![1]);
    }

    #[test]
    fn folds_case_on_both_sides() {
        assert_eq!(ids(&search("ECHO", &fixtures())), vec![2]);
        assert_eq!(ids(&search("E", &fixtures())), vec![1, 2]);
    }

    #[test]
    fn searches_category_and_location() {
        assert_eq!(ids(&search("draft", &fixtures())), vec![3]);
        assert_eq!(ids(&search("brooklyn", &fixtures())), vec![2]);
        assert_eq!(ids(&search("poetry", &fixtures())), vec![1, 2]);
    }

    #[test]
    fn date_is_not_searched() {
        assert!(search("2024", &fixtures()).is_empty());
    }

    #[test]
    fn substring_spans_lines_verbatim() {
        assert_eq!(ids(&search("wash\nlight", &fixtures())), vec![3]);
        assert!(search("wash light", &fixtures()).is_empty());
    }

    #[test]
    fn no_match_is_empty() {
        assert!(search("glacier", &fixtures()).is_empty());
    }

    #[test]
    fn empty_query_returns_everything() {
        assert_eq!(ids(&search("", &fixtures())), vec![1, 2, 3]);
    }

    #[test]
    fn repeated_searches_agree() {
        let records = fixtures();
        let first = search("o", &records);
        let second = search("o", &records);
        assert_eq!(first, second);
        assert_eq!(ids(&first), vec![1, 2]);
    }

    #[test]
    fn preserves_input_order() {
        let mut records = fixtures();
        records.reverse();
        assert_eq!(ids(&search("e", &records)), vec![2, 1]);
    }

    #[test]
    fn every_result_satisfies_definition() {
        let records = fixtures();
        for q in ["a", "IN", "n", "y", "zz", "\n"] {
            let found = ids(&search(q, &records));
            let expected: Vec<u32> = records.iter()
                .filter(|r| {
                    let q = q.to_lowercase();
                    r.title.to_lowercase().contains(&q)
                        || r.content.to_lowercase().contains(&q)
                        || r.category.to_lowercase().contains(&q)
                        || r.location.to_lowercase().contains(&q)
                })
                .map(|r| r.id)
                .collect();
            assert_eq!(found, expected, "query {:?}", q);
        }
    }
}
