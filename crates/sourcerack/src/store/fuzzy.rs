//! Trigram-based fuzzy symbol search.
//!
//! Symbol names are shingled into 3-character trigrams at insert time;
//! lookup joins `symbols` with `symbol_trigrams` on the query's trigrams and
//! scores candidates by Jaccard similarity, computed in SQL so it runs in
//! the index.

use super::{symbol_cols_qualified, SqiStore, SymbolRow};
use serde::Serialize;
use std::collections::BTreeSet;

/// Trigrams of a symbol name: lowercased, non-alphanumeric mapped to space,
/// padded with two leading/trailing spaces; pure-whitespace shingles are
/// dropped. An empty name yields the empty set.
pub fn trigrams(name: &str) -> BTreeSet<String> {
    let normalized: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let padded = format!("  {}  ", normalized);
    let chars: Vec<char> = padded.chars().collect();

    let mut out = BTreeSet::new();
    for window in chars.windows(3) {
        let trigram: String = window.iter().collect();
        if trigram.trim().is_empty() {
            continue;
        }
        out.insert(trigram);
    }
    out
}

/// A fuzzy candidate with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct FuzzyMatch {
    pub symbol: SymbolRow,
    pub similarity: f64,
}

impl SqiStore {
    /// Fuzzy symbol lookup.
    ///
    /// Ordering: exact name match first, case-insensitive equality next, then
    /// similarity descending. Candidates below `min_similarity` are dropped
    /// unless they are exact or case-insensitive matches. An empty query
    /// returns no results.
    pub async fn find_symbols_fuzzy(
        &self,
        commit_id: i64,
        query: &str,
        min_similarity: f64,
        limit: usize,
        kind: Option<&str>,
    ) -> Result<Vec<FuzzyMatch>, libsql::Error> {
        let query_trigrams = trigrams(query);
        if query_trigrams.is_empty() {
            return Ok(Vec::new());
        }

        let query_count = query_trigrams.len();
        let trigram_start = 4; // ?1 commit, ?2 min_similarity, ?3 query text
        let placeholders: Vec<String> = (0..query_count)
            .map(|i| format!("?{}", trigram_start + i))
            .collect();
        let kind_filter = match kind {
            Some(_) => format!(" AND s.kind = ?{}", trigram_start + query_count),
            None => String::new(),
        };

        let sql = format!(
            "SELECT {cols},
                    CAST(COUNT(*) AS REAL) /
                        ((SELECT COUNT(*) FROM symbol_trigrams t2 WHERE t2.symbol_id = s.id)
                         + {qn} - COUNT(*)) AS similarity
             FROM symbols s
             JOIN symbol_trigrams t ON t.symbol_id = s.id
             WHERE s.commit_id = ?1 AND t.trigram IN ({placeholders}){kind_filter}
             GROUP BY s.id
             HAVING (CAST(COUNT(*) AS REAL) /
                        ((SELECT COUNT(*) FROM symbol_trigrams t2 WHERE t2.symbol_id = s.id)
                         + {qn} - COUNT(*))) >= ?2
                 OR s.name = ?3 OR LOWER(s.name) = LOWER(?3)
             ORDER BY (s.name = ?3) DESC, (LOWER(s.name) = LOWER(?3)) DESC,
                      similarity DESC, s.name, s.id
             LIMIT {limit}",
            cols = symbol_cols_qualified(),
            qn = query_count,
            placeholders = placeholders.join(", "),
            kind_filter = kind_filter,
            limit = limit.max(1),
        );

        let mut values: Vec<libsql::Value> = vec![
            libsql::Value::from(commit_id),
            libsql::Value::from(min_similarity),
            libsql::Value::from(query.to_string()),
        ];
        for trigram in &query_trigrams {
            values.push(libsql::Value::from(trigram.clone()));
        }
        if let Some(kind) = kind {
            values.push(libsql::Value::from(kind.to_string()));
        }

        let mut out = Vec::new();
        let mut rows = self.conn.query(&sql, values).await?;
        while let Some(row) = rows.next().await? {
            let symbol = SymbolRow::from_row(&row)?;
            let similarity: f64 = row.get(15)?;
            out.push(FuzzyMatch { symbol, similarity });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigram_shape() {
        let set = trigrams("getUser");
        for trigram in &set {
            assert_eq!(trigram.chars().count(), 3);
            assert!(trigram
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '));
        }
        assert!(set.contains("  g"));
        assert!(set.contains("get"));
        assert!(set.contains("er "));
    }

    #[test]
    fn non_alphanumeric_becomes_space() {
        let set = trigrams("get_user");
        assert!(set.contains("et "));
        assert!(set.contains(" us"));
        assert!(!set.contains("t_u"));
    }

    #[test]
    fn empty_and_whitespace_names() {
        assert!(trigrams("").is_empty());
        assert!(trigrams("   ").is_empty());
        assert!(trigrams("--").is_empty());
    }

    #[test]
    fn jaccard_intuition() {
        // authenticate vs autenticate share most trigrams
        let a = trigrams("authenticate");
        let b = trigrams("autenticate");
        let shared = a.intersection(&b).count();
        let union = a.union(&b).count();
        let sim = shared as f64 / union as f64;
        assert!(sim > 0.4, "similarity {sim} too low");
    }
}
