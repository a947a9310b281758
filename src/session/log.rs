use crate::models::MessageRecord;

/// Ordered chat history for the current session.
///
/// Insertion order is display order. [`SessionLog::replace`] is the only way
/// to rewrite existing order; everything else appends or mutates one record
/// in place.
#[derive(Debug, Default, Clone)]
pub struct SessionLog {
    records: Vec<MessageRecord>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends and returns the position of the new record.
    pub fn append(&mut self, record: MessageRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MessageRecord> {
        self.records.get_mut(index)
    }

    /// Latest position holding `id`. Ids are unique per session, so the
    /// search from the back only matters after a server reuses one.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().rposition(|r| r.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&MessageRecord> {
        self.position(id).and_then(|i| self.records.get(i))
    }

    /// Swaps in a whole new history. Never merges.
    pub fn replace(&mut self, records: Vec<MessageRecord>) {
        self.records = records;
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;

    #[test]
    fn append_preserves_insertion_order() {
        let mut log = SessionLog::new();
        log.append(MessageRecord::local(Sender::User, "one"));
        log.append(MessageRecord::local(Sender::Bot, "two"));
        let texts: Vec<_> = log.records().iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["one", "two"]);
    }

    #[test]
    fn replace_leaves_no_residue() {
        let mut log = SessionLog::new();
        let old = MessageRecord::local(Sender::User, "old");
        let old_id = old.id.clone();
        log.append(old);

        let fresh = vec![
            MessageRecord::local(Sender::Bot, "a"),
            MessageRecord::local(Sender::User, "b"),
        ];
        log.replace(fresh.clone());

        assert_eq!(log.records(), fresh.as_slice());
        assert!(log.find(&old_id).is_none());
    }

    #[test]
    fn position_finds_by_id() {
        let mut log = SessionLog::new();
        log.append(MessageRecord::local(Sender::User, "x"));
        let idx = log.append(MessageRecord::open_stream("m1", Sender::Bot, ""));
        assert_eq!(log.position("m1"), Some(idx));
        assert_eq!(log.position("nope"), None);
    }
}
