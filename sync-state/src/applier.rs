//! Transactional instruction applier.

use rusqlite::params;
use sync_types::{Changeset, Instruction};

use crate::error::{StateError, StateResult};
use crate::store::WriteTransaction;

/// Applies a decoded changeset inside one write transaction.
///
/// The applier holds the transaction exclusively; the caller commits (or
/// drops, rolling back) once `apply` returns.
pub struct InstructionApplier<'a, 'conn> {
    tx: &'a mut WriteTransaction<'conn>,
}

impl<'a, 'conn> InstructionApplier<'a, 'conn> {
    /// Bind an applier to an open write transaction.
    pub fn new(tx: &'a mut WriteTransaction<'conn>) -> Self {
        Self { tx }
    }

    /// Apply every instruction of `changeset`, then record its header in
    /// the client history.
    pub fn apply(&mut self, changeset: &Changeset) -> StateResult<()> {
        tracing::trace!(
            "applying {} instruction(s) for client version {}",
            changeset.instructions.len(),
            changeset.version
        );
        for instruction in &changeset.instructions {
            self.apply_instruction(instruction)?;
        }
        self.record_history(changeset)
    }

    fn apply_instruction(&mut self, instruction: &Instruction) -> StateResult<()> {
        let conn = self.tx.connection();
        match instruction {
            Instruction::CreateObject { table, object } => {
                conn.execute(
                    "INSERT OR IGNORE INTO objects (tbl, obj, field, value) \
                     VALUES (?1, ?2, '', NULL)",
                    params![table, object],
                )?;
            }
            Instruction::EraseObject { table, object } => {
                conn.execute(
                    "DELETE FROM objects WHERE tbl = ?1 AND obj = ?2",
                    params![table, object],
                )?;
            }
            Instruction::Set {
                table,
                object,
                field,
                value,
            } => {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS (SELECT 1 FROM objects \
                     WHERE tbl = ?1 AND obj = ?2 AND field = '')",
                    params![table, object],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StateError::MissingObject {
                        table: table.clone(),
                        object: object.clone(),
                    });
                }
                let blob = value.to_bytes()?;
                conn.execute(
                    "INSERT INTO objects (tbl, obj, field, value) VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT (tbl, obj, field) DO UPDATE SET value = excluded.value",
                    params![table, object, field, blob],
                )?;
            }
            Instruction::ClearTable { table } => {
                conn.execute("DELETE FROM objects WHERE tbl = ?1", params![table])?;
            }
        }
        Ok(())
    }

    fn record_history(&mut self, changeset: &Changeset) -> StateResult<()> {
        let inserted = self.tx.connection().execute(
            "INSERT OR IGNORE INTO client_history \
             (version, last_integrated_remote_version, origin_timestamp, \
              origin_file_ident, instruction_count) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                changeset.version as i64,
                changeset.last_integrated_remote_version as i64,
                changeset.origin_timestamp as i64,
                changeset.origin_file_ident as i64,
                changeset.instructions.len() as i64,
            ],
        )?;
        if inserted == 0 {
            return Err(StateError::DuplicateClientVersion {
                version: changeset.version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use sync_types::Value;

    fn changeset(version: u64, instructions: Vec<Instruction>) -> Changeset {
        Changeset {
            version,
            last_integrated_remote_version: 0,
            origin_timestamp: 1600000000,
            origin_file_ident: 0,
            instructions,
        }
    }

    fn create(table: &str, object: &str) -> Instruction {
        Instruction::CreateObject {
            table: table.into(),
            object: object.into(),
        }
    }

    fn set(table: &str, object: &str, field: &str, value: Value) -> Instruction {
        Instruction::Set {
            table: table.into(),
            object: object.into(),
            field: field.into(),
            value,
        }
    }

    #[test]
    fn create_and_set_then_read_back() {
        let mut store = StateStore::in_memory().unwrap();

        let mut tx = store.start_write().unwrap();
        let mut applier = InstructionApplier::new(&mut tx);
        applier
            .apply(&changeset(
                1,
                vec![
                    create("notes", "n-1"),
                    set("notes", "n-1", "title", Value::String("hello".into())),
                ],
            ))
            .unwrap();
        tx.commit().unwrap();

        assert!(store.object_exists("notes", "n-1").unwrap());
        let raw = store.object_field("notes", "n-1", "title").unwrap().unwrap();
        assert_eq!(
            Value::from_bytes(&raw).unwrap(),
            Value::String("hello".into())
        );
        assert_eq!(store.client_history_versions().unwrap(), vec![1]);
    }

    #[test]
    fn set_on_missing_object_fails() {
        let mut store = StateStore::in_memory().unwrap();

        let mut tx = store.start_write().unwrap();
        let mut applier = InstructionApplier::new(&mut tx);
        let err = applier
            .apply(&changeset(
                1,
                vec![set("notes", "ghost", "title", Value::Null)],
            ))
            .unwrap_err();

        assert!(matches!(err, StateError::MissingObject { .. }));
    }

    #[test]
    fn erase_removes_object_and_fields() {
        let mut store = StateStore::in_memory().unwrap();

        let mut tx = store.start_write().unwrap();
        InstructionApplier::new(&mut tx)
            .apply(&changeset(
                1,
                vec![
                    create("notes", "n-1"),
                    set("notes", "n-1", "pinned", Value::Bool(true)),
                    Instruction::EraseObject {
                        table: "notes".into(),
                        object: "n-1".into(),
                    },
                ],
            ))
            .unwrap();
        tx.commit().unwrap();

        assert!(!store.object_exists("notes", "n-1").unwrap());
        assert!(store
            .object_field("notes", "n-1", "pinned")
            .unwrap()
            .is_none());
    }

    #[test]
    fn clear_table_only_touches_that_table() {
        let mut store = StateStore::in_memory().unwrap();

        let mut tx = store.start_write().unwrap();
        InstructionApplier::new(&mut tx)
            .apply(&changeset(
                1,
                vec![
                    create("notes", "n-1"),
                    create("tags", "t-1"),
                    Instruction::ClearTable {
                        table: "notes".into(),
                    },
                ],
            ))
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(store.object_count("notes").unwrap(), 0);
        assert_eq!(store.object_count("tags").unwrap(), 1);
    }

    #[test]
    fn later_set_overwrites_earlier_set() {
        let mut store = StateStore::in_memory().unwrap();

        let mut tx = store.start_write().unwrap();
        InstructionApplier::new(&mut tx)
            .apply(&changeset(
                1,
                vec![
                    create("notes", "n-1"),
                    set("notes", "n-1", "count", Value::Int(1)),
                    set("notes", "n-1", "count", Value::Int(2)),
                ],
            ))
            .unwrap();
        tx.commit().unwrap();

        let raw = store.object_field("notes", "n-1", "count").unwrap().unwrap();
        assert_eq!(Value::from_bytes(&raw).unwrap(), Value::Int(2));
    }

    #[test]
    fn duplicate_client_version_fails() {
        let mut store = StateStore::in_memory().unwrap();

        let mut tx = store.start_write().unwrap();
        InstructionApplier::new(&mut tx)
            .apply(&changeset(7, vec![create("notes", "a")]))
            .unwrap();
        tx.commit().unwrap();

        let mut tx = store.start_write().unwrap();
        let err = InstructionApplier::new(&mut tx)
            .apply(&changeset(7, vec![create("notes", "b")]))
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::DuplicateClientVersion { version: 7 }
        ));
    }
}
