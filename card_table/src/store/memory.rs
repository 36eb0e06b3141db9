//! In-memory store backend.

use super::{Command, Reply, Score, Store, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Value {
    Counter(i64),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    Sorted(SortedSet),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Counter(_) => false,
            Value::Hash(fields) => fields.is_empty(),
            Value::Set(members) => members.is_empty(),
            Value::Sorted(sorted) => sorted.is_empty(),
        }
    }
}

/// Sorted set indexed both by member and by `(score, member)`.
///
/// `high` only grows; it survives the set being emptied so appended scores
/// keep increasing until the key is deleted.
#[derive(Debug, Clone, Default)]
struct SortedSet {
    scores: HashMap<String, Score>,
    order: BTreeSet<(Score, String)>,
    high: Score,
}

impl SortedSet {
    fn len(&self) -> usize {
        self.scores.len()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn score(&self, member: &str) -> Option<Score> {
        self.scores.get(member).copied()
    }

    /// Returns true if the member was not present before
    fn insert(&mut self, member: String, score: Score) -> bool {
        let added = match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                self.order.remove(&(previous, member.clone()));
                false
            }
            None => true,
        };
        self.order.insert((score, member));
        self.high = self.high.max(score);
        added
    }

    fn append(&mut self, member: String) -> Option<Score> {
        let score = self.high.checked_add(1)?;
        self.insert(member, score);
        Some(score)
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.order.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn pop_min(&mut self) -> Option<String> {
        let (_, member) = self.order.pop_first()?;
        self.scores.remove(&member);
        Some(member)
    }

    fn range(&self, limit: Option<usize>) -> Vec<(String, Score)> {
        self.order
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(score, member)| (member.clone(), *score))
            .collect()
    }
}

/// Copy of every key a batch touches. Commands run against the copy and it
/// is written back only when the whole batch succeeded.
struct Staged {
    entries: HashMap<String, Option<Value>>,
}

impl Staged {
    fn load(keyspace: &HashMap<String, Value>, commands: &[Command]) -> Self {
        let mut entries = HashMap::new();
        for key in commands.iter().flat_map(Command::keys) {
            entries
                .entry(key.to_string())
                .or_insert_with(|| keyspace.get(key).cloned());
        }
        Self { entries }
    }

    fn commit(self, keyspace: &mut HashMap<String, Value>) {
        for (key, value) in self.entries {
            match value {
                // An emptied sorted set still carries its high-water mark
                Some(Value::Sorted(sorted)) if sorted.high > 0 => {
                    keyspace.insert(key, Value::Sorted(sorted));
                }
                Some(value) if !value.is_empty() => {
                    keyspace.insert(key, value);
                }
                _ => {
                    keyspace.remove(&key);
                }
            }
        }
    }

    fn slot(&mut self, key: &str) -> &mut Option<Value> {
        self.entries.entry(key.to_string()).or_default()
    }

    fn counter_mut(&mut self, key: &str) -> StoreResult<&mut i64> {
        match self.slot(key).get_or_insert(Value::Counter(0)) {
            Value::Counter(value) => Ok(value),
            _ => Err(wrong_type(key)),
        }
    }

    fn hash(&self, key: &str) -> StoreResult<Option<&BTreeMap<String, String>>> {
        match self.entries.get(key) {
            Some(Some(Value::Hash(fields))) => Ok(Some(fields)),
            Some(Some(_)) => Err(wrong_type(key)),
            _ => Ok(None),
        }
    }

    fn hash_mut(&mut self, key: &str) -> StoreResult<&mut BTreeMap<String, String>> {
        match self.slot(key).get_or_insert_with(|| Value::Hash(BTreeMap::new())) {
            Value::Hash(fields) => Ok(fields),
            _ => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str) -> StoreResult<Option<&BTreeSet<String>>> {
        match self.entries.get(key) {
            Some(Some(Value::Set(members))) => Ok(Some(members)),
            Some(Some(_)) => Err(wrong_type(key)),
            _ => Ok(None),
        }
    }

    fn set_mut(&mut self, key: &str) -> StoreResult<&mut BTreeSet<String>> {
        match self.slot(key).get_or_insert_with(|| Value::Set(BTreeSet::new())) {
            Value::Set(members) => Ok(members),
            _ => Err(wrong_type(key)),
        }
    }

    fn sorted(&self, key: &str) -> StoreResult<Option<&SortedSet>> {
        match self.entries.get(key) {
            Some(Some(Value::Sorted(sorted))) => Ok(Some(sorted)),
            Some(Some(_)) => Err(wrong_type(key)),
            _ => Ok(None),
        }
    }

    fn sorted_mut(&mut self, key: &str) -> StoreResult<&mut SortedSet> {
        match self
            .slot(key)
            .get_or_insert_with(|| Value::Sorted(SortedSet::default()))
        {
            Value::Sorted(sorted) => Ok(sorted),
            _ => Err(wrong_type(key)),
        }
    }

    /// Fail with `MembersPresent` if any of `members` is already under `key`
    fn require_absent(&self, key: &str, members: &[String]) -> StoreResult<()> {
        let sorted = self.sorted(key)?;
        let present: Vec<String> = members
            .iter()
            .filter(|member| sorted.and_then(|sorted| sorted.score(member)).is_some())
            .cloned()
            .collect();
        if present.is_empty() {
            Ok(())
        } else {
            Err(StoreError::MembersPresent {
                key: key.to_string(),
                members: present,
            })
        }
    }

    fn append(&mut self, key: &str, member: String) -> StoreResult<Score> {
        self.sorted_mut(key)?
            .append(member)
            .ok_or_else(|| StoreError::Overflow(key.to_string()))
    }

    fn apply(&mut self, command: Command) -> StoreResult<Reply> {
        match command {
            Command::Incr { key } => {
                let counter = self.counter_mut(&key)?;
                *counter = counter
                    .checked_add(1)
                    .ok_or_else(|| StoreError::Overflow(key.clone()))?;
                Ok(Reply::Int(*counter))
            }

            Command::HashSet { key, fields } => {
                self.hash_mut(&key)?.extend(fields);
                Ok(Reply::Unit)
            }

            Command::HashGetAll { key } => {
                Ok(Reply::Hash(self.hash(&key)?.cloned().unwrap_or_default()))
            }

            Command::SetAdd { key, members } => {
                let set = self.set_mut(&key)?;
                let mut added = 0;
                for member in members {
                    if set.insert(member) {
                        added += 1;
                    }
                }
                Ok(Reply::Int(added))
            }

            Command::SetMembers { key } => Ok(Reply::Members(
                self.set(&key)?
                    .map(|members| members.iter().cloned().collect())
                    .unwrap_or_default(),
            )),

            Command::Exists { key } => Ok(Reply::Bool(matches!(
                self.entries.get(&key),
                Some(Some(value)) if !value.is_empty()
            ))),

            Command::Delete { key } => {
                let slot = self.slot(&key);
                let existed = slot.as_ref().is_some_and(|value| !value.is_empty());
                *slot = None;
                Ok(Reply::Bool(existed))
            }

            Command::SortedAdd { key, entries } => {
                let sorted = self.sorted_mut(&key)?;
                let mut added = 0;
                for (score, member) in entries {
                    if sorted.insert(member, score) {
                        added += 1;
                    }
                }
                Ok(Reply::Int(added))
            }

            Command::SortedAppend { key, members } => {
                for member in members {
                    self.append(&key, member)?;
                }
                Ok(Reply::Int(self.sorted_mut(&key)?.high))
            }

            Command::SortedRange { key, limit } => Ok(Reply::Scored(
                self.sorted(&key)?
                    .map(|sorted| sorted.range(limit))
                    .unwrap_or_default(),
            )),

            Command::SortedRemove { key, members } => {
                if self.sorted(&key)?.is_none() {
                    return Ok(Reply::Int(0));
                }
                let sorted = self.sorted_mut(&key)?;
                let mut removed = 0;
                for member in &members {
                    if sorted.remove(member) {
                        removed += 1;
                    }
                }
                Ok(Reply::Int(removed))
            }

            Command::SortedScores { key, members } => {
                let sorted = self.sorted(&key)?;
                Ok(Reply::Scores(
                    members
                        .iter()
                        .map(|member| sorted.and_then(|sorted| sorted.score(member)))
                        .collect(),
                ))
            }

            Command::SortedCount { key } => Ok(Reply::Int(
                self.sorted(&key)?.map_or(0, |sorted| sorted.len() as i64),
            )),

            Command::SortedHighWater { key } => Ok(Reply::Int(
                self.sorted(&key)?.map_or(0, |sorted| sorted.high),
            )),

            Command::SortedPopMinInto {
                source,
                destination,
            } => {
                let has_members = self
                    .sorted(&source)?
                    .is_some_and(|sorted| !sorted.is_empty());
                if !has_members {
                    return Ok(Reply::Scored(Vec::new()));
                }
                match self.sorted_mut(&source)?.pop_min() {
                    Some(member) => {
                        self.require_absent(&destination, std::slice::from_ref(&member))?;
                        let score = self.append(&destination, member.clone())?;
                        Ok(Reply::Scored(vec![(member, score)]))
                    }
                    None => Ok(Reply::Scored(Vec::new())),
                }
            }

            Command::SortedMoveAll {
                source,
                destination,
            } => {
                let entries = self
                    .sorted(&source)?
                    .map(|sorted| sorted.range(None))
                    .unwrap_or_default();
                let members: Vec<String> =
                    entries.iter().map(|(member, _)| member.clone()).collect();
                self.require_absent(&destination, &members)?;
                *self.slot(&source) = None;

                let mut moved = Vec::with_capacity(entries.len());
                for (member, _) in entries {
                    let score = self.append(&destination, member.clone())?;
                    moved.push((member, score));
                }
                Ok(Reply::Scored(moved))
            }

            Command::RequirePresent { key, members } => {
                let sorted = self.sorted(&key)?;
                let missing: Vec<String> = members
                    .into_iter()
                    .filter(|member| sorted.and_then(|sorted| sorted.score(member)).is_none())
                    .collect();
                if missing.is_empty() {
                    Ok(Reply::Unit)
                } else {
                    Err(StoreError::MembersMissing {
                        key,
                        members: missing,
                    })
                }
            }

            Command::RequireAbsent { key, members } => {
                self.require_absent(&key, &members)?;
                Ok(Reply::Unit)
            }
        }
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

/// In-process store. A single async mutex serializes batches, so every
/// transaction sees and publishes a consistent keyspace.
#[derive(Default)]
pub struct MemoryStore {
    keyspace: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All live keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let keyspace = self.keyspace.lock().await;
        let mut keys: Vec<String> = keyspace.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn transaction(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>> {
        let mut keyspace = self.keyspace.lock().await;
        let mut staged = Staged::load(&keyspace, &commands);

        let replies = commands
            .into_iter()
            .map(|command| staged.apply(command))
            .collect::<StoreResult<Vec<_>>>()?;

        staged.commit(&mut keyspace);
        Ok(replies)
    }
}
