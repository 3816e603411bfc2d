//! Recursive impact, dead-code, and hotspot analyses.

use super::{symbol_cols_qualified, SqiStore, SymbolRow};
use libsql::params;
use serde::Serialize;
use std::collections::HashMap;

/// A symbol reached by the transitive impact walk, with its minimum depth.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactEntry {
    pub symbol: SymbolRow,
    pub depth: usize,
}

/// A top-level symbol nothing points at.
#[derive(Debug, Clone, Serialize)]
pub struct DeadSymbol {
    pub symbol: SymbolRow,
}

/// A symbol ranked by inbound usage count.
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub symbol: SymbolRow,
    pub usage_count: usize,
}

impl SqiStore {
    /// Symbols reachable in at most `max_depth` hops by following usages of
    /// the current frontier to their enclosing symbols. Each entry carries
    /// its minimum depth; cycle safety comes from the depth bound plus
    /// deduplication on symbol id. `max_depth == 0` yields the empty set.
    pub async fn get_transitive_impact(
        &self,
        symbol_id: i64,
        max_depth: usize,
    ) -> Result<Vec<ImpactEntry>, libsql::Error> {
        let mut visited: HashMap<i64, (SymbolRow, usize)> = HashMap::new();
        let mut frontier = vec![symbol_id];

        for depth in 1..=max_depth {
            if frontier.is_empty() {
                break;
            }
            let placeholders: Vec<String> =
                (1..=frontier.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT DISTINCT {cols}
                 FROM usages u JOIN symbols s ON s.id = u.enclosing_symbol_id
                 WHERE u.definition_symbol_id IN ({placeholders})",
                cols = symbol_cols_qualified(),
                placeholders = placeholders.join(", "),
            );
            let values: Vec<libsql::Value> =
                frontier.iter().map(|id| libsql::Value::from(*id)).collect();

            let mut next = Vec::new();
            let mut rows = self.conn.query(&sql, values).await?;
            while let Some(row) = rows.next().await? {
                let symbol = SymbolRow::from_row(&row)?;
                if symbol.id == symbol_id || visited.contains_key(&symbol.id) {
                    continue;
                }
                next.push(symbol.id);
                visited.insert(symbol.id, (symbol, depth));
            }
            frontier = next;
        }

        let mut out: Vec<ImpactEntry> = visited
            .into_values()
            .map(|(symbol, depth)| ImpactEntry { symbol, depth })
            .collect();
        out.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.symbol.file_path.cmp(&b.symbol.file_path))
                .then_with(|| a.symbol.start_line.cmp(&b.symbol.start_line))
        });
        Ok(out)
    }

    /// Top-level symbols of the callable/type kinds with zero usages
    /// resolving to them. Exported symbols sort first.
    pub async fn get_dead_symbols(
        &self,
        commit_id: i64,
        exported_only: bool,
        limit: usize,
    ) -> Result<Vec<DeadSymbol>, libsql::Error> {
        let exported_filter = if exported_only {
            " AND s.is_exported = 1"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {cols} FROM symbols s
             WHERE s.commit_id = ?1 AND s.parent_symbol_id IS NULL
               AND s.kind IN ('function', 'method', 'class', 'interface', 'type_alias')
               AND NOT EXISTS (SELECT 1 FROM usages u WHERE u.definition_symbol_id = s.id)
               {exported_filter}
             ORDER BY s.is_exported DESC, s.file_path, s.start_line
             LIMIT ?2",
            cols = symbol_cols_qualified(),
            exported_filter = exported_filter,
        );

        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(&sql, params![commit_id, limit as i64])
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(DeadSymbol {
                symbol: SymbolRow::from_row(&row)?,
            });
        }
        Ok(out)
    }

    /// Symbols ordered by inbound usage count.
    pub async fn get_hotspots(
        &self,
        commit_id: i64,
        limit: usize,
    ) -> Result<Vec<Hotspot>, libsql::Error> {
        let sql = format!(
            "SELECT {cols}, COUNT(u.id) AS inbound
             FROM symbols s JOIN usages u ON u.definition_symbol_id = s.id
             WHERE s.commit_id = ?1
             GROUP BY s.id
             ORDER BY inbound DESC, s.name, s.id
             LIMIT ?2",
            cols = symbol_cols_qualified(),
        );
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(&sql, params![commit_id, limit as i64])
            .await?;
        while let Some(row) = rows.next().await? {
            let symbol = SymbolRow::from_row(&row)?;
            let inbound: i64 = row.get(15)?;
            out.push(Hotspot {
                symbol,
                usage_count: inbound as usize,
            });
        }
        Ok(out)
    }
}

