//! Dashboard filter state.
//!
//! Every filter keeps the value the loaded data was fetched for (`current`)
//! and the value the user last picked (`requested`). [`FilterState::reconcile`]
//! promotes requested values and tells the caller whether to fetch again.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    Subpage,
    Team,
    Service,
    Env,
    Year,
    Month,
    LeftMenu,
    Day,
}

impl FilterKey {
    pub const ALL: [FilterKey; 8] = [
        Self::Subpage,
        Self::Team,
        Self::Service,
        Self::Env,
        Self::Year,
        Self::Month,
        Self::LeftMenu,
        Self::Day,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subpage => "subpage",
            Self::Team => "team",
            Self::Service => "service",
            Self::Env => "env",
            Self::Year => "year",
            Self::Month => "month",
            Self::LeftMenu => "left_menu",
            Self::Day => "day",
        }
    }

    /// Service, environment and team may stay unset without blocking a fetch;
    /// only one of the two menus uses them at a time.
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Service | Self::Env | Self::Team)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s || (s == "leftMenu" && *key == Self::LeftMenu))
            .ok_or_else(|| CoreError::UnknownFilter(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSlot {
    pub current: Option<String>,
    pub requested: Option<String>,
}

/// Result of [`FilterState::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Nothing changed since the last fetch.
    Unchanged,
    /// Something changed and every required filter is set.
    Refetch,
    /// A required filter has no value yet; fetching would be premature.
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    slots: BTreeMap<FilterKey, FilterSlot>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            slots: FilterKey::ALL
                .into_iter()
                .map(|key| (key, FilterSlot::default()))
                .collect(),
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, key: FilterKey, value: impl Into<String>) {
        self.slot_mut(key).requested = Some(value.into());
    }

    pub fn clear(&mut self, key: FilterKey) {
        self.slot_mut(key).requested = None;
    }

    pub fn current(&self, key: FilterKey) -> Option<&str> {
        self.slots.get(&key).and_then(|slot| slot.current.as_deref())
    }

    pub fn requested(&self, key: FilterKey) -> Option<&str> {
        self.slots.get(&key).and_then(|slot| slot.requested.as_deref())
    }

    /// Promote requested values to current and decide whether to refetch.
    ///
    /// Current values are updated even when the decision is
    /// [`RefreshDecision::Incomplete`].
    pub fn reconcile(&mut self) -> RefreshDecision {
        let mut changed = false;
        let mut incomplete = false;

        for (key, slot) in self.slots.iter_mut() {
            if slot.current != slot.requested {
                changed = true;
                slot.current = slot.requested.clone();
            }
            if !key.is_optional() && slot.requested.is_none() {
                incomplete = true;
            }
        }

        match (changed, incomplete) {
            (_, true) => RefreshDecision::Incomplete,
            (true, false) => RefreshDecision::Refetch,
            (false, false) => RefreshDecision::Unchanged,
        }
    }

    fn slot_mut(&mut self, key: FilterKey) -> &mut FilterSlot {
        self.slots.entry(key).or_default()
    }
}
