//! 영역 캐시와 변경 감지.
//!
//! 이름별로 마지막으로 관측한 디스크립터를 보관한다. 폴링 태스크가 유일한 작성자이고,
//! 파이프라인 소비자는 적용 직전에 [`RegionCache::is_current`]로 오래된 항목을 걸러낸다.
//!
//! `last_edit`는 캐시 전체에서 공유하는 논리 시계에서 찍히므로
//! 같은 이름의 스탬프는 삭제 후 재등장하더라도 항상 증가한다.
//!
//! 스윕된 항목은 원격 삭제가 확인될 때까지 묘비로 남는다. 삭제를 큐에 넣지 못했거나
//! 원격 삭제가 실패한 묘비는 다음 스윕에서 다시 나온다.

use obslink_core::models::region::{RegionDescriptor, RegionFamily};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// 묘비 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    /// 삭제가 큐에 있거나 적용 중
    InFlight,
    /// 다음 스윕에서 다시 내보낸다
    Retry,
}

#[derive(Debug, Clone)]
struct Entry {
    desc: RegionDescriptor,
    /// 원격 적용이 실패했거나 큐에 넣지 못함. 다음 관측에서 변경으로 취급한다.
    unsynced: bool,
    removal: Option<Removal>,
}

impl Entry {
    fn live(desc: RegionDescriptor) -> Self {
        Self {
            desc,
            unsynced: false,
            removal: None,
        }
    }

    fn is_live(&self) -> bool {
        self.removal.is_none()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    clock: u64,
}

impl CacheState {
    fn stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn live(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name).filter(|e| e.is_live())
    }
}

/// 영역 캐시
#[derive(Debug, Default)]
pub struct RegionCache {
    state: Mutex<CacheState>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새로 계산한 디스크립터 관측.
    ///
    /// 캐시 값과 `last_edit` 외의 필드가 다르거나 캐시 값이 없으면 새 스탬프를 찍어
    /// 저장하고 동기화할 스냅샷을 돌려준다. 같으면 None.
    /// 묘비가 있던 이름은 되살아난다.
    pub fn observe(&self, mut desc: RegionDescriptor) -> Option<RegionDescriptor> {
        let mut state = self.state.lock();
        if let Some(entry) = state.live(&desc.name) {
            if !entry.unsynced && entry.desc.same_state(&desc) {
                return None;
            }
        }
        desc.last_edit = state.stamp();
        trace!(name = %desc.name, last_edit = desc.last_edit, "영역 변경 감지");
        state.entries.insert(desc.name.clone(), Entry::live(desc.clone()));
        Some(desc)
    }

    /// 계열에 속하지만 이번 프레임에 관측되지 않은 항목을 묘비로 바꾸고
    /// 원격 삭제용 스냅샷(enabled=false, 새 스탬프)으로 돌려준다.
    /// 재시도 대기 중인 묘비도 새 스탬프로 다시 나온다.
    pub fn sweep(&self, family: RegionFamily, still_present: &HashSet<String>) -> Vec<RegionDescriptor> {
        let mut state = self.state.lock();
        let mut stale: Vec<String> = state
            .entries
            .iter()
            .filter(|(name, entry)| {
                family.matches(name)
                    && !still_present.contains(*name)
                    && entry.removal != Some(Removal::InFlight)
            })
            .map(|(name, _)| name.clone())
            .collect();
        stale.sort();

        let mut removed = Vec::with_capacity(stale.len());
        for name in stale {
            let stamp = state.stamp();
            if let Some(entry) = state.entries.get_mut(&name) {
                if entry.removal == Some(Removal::Retry) {
                    trace!(name = %name, "삭제 재시도");
                }
                entry.desc.enabled = false;
                entry.desc.last_edit = stamp;
                entry.unsynced = false;
                entry.removal = Some(Removal::InFlight);
                removed.push(entry.desc.clone());
            }
        }
        removed
    }

    /// 원격 삭제 완료. 같은 스탬프의 묘비만 지운다.
    pub fn confirm_removal(&self, name: &str, last_edit: u64) {
        let mut state = self.state.lock();
        let done = state
            .entries
            .get(name)
            .is_some_and(|e| !e.is_live() && e.desc.last_edit == last_edit);
        if done {
            state.entries.remove(name);
        }
    }

    /// 삭제를 큐에 넣지 못했거나 원격 삭제가 실패함. 다음 스윕에서 다시 내보낸다.
    pub fn mark_removal_failed(&self, name: &str, last_edit: u64) {
        if let Some(entry) = self.state.lock().entries.get_mut(name) {
            if !entry.is_live() && entry.desc.last_edit == last_edit {
                entry.removal = Some(Removal::Retry);
            }
        }
    }

    /// 묘비까지 확인된 뒤 원격에 다시 생긴 필터의 삭제 예약.
    /// 캐시에 아무 항목도 없을 때만 새 묘비를 만들고 삭제 스냅샷을 돌려준다.
    pub fn reinstate_removal(&self, mut desc: RegionDescriptor) -> Option<RegionDescriptor> {
        let mut state = self.state.lock();
        if state.entries.contains_key(&desc.name) {
            return None;
        }
        desc.enabled = false;
        desc.last_edit = state.stamp();
        state.entries.insert(
            desc.name.clone(),
            Entry {
                desc: desc.clone(),
                unsynced: false,
                removal: Some(Removal::InFlight),
            },
        );
        Some(desc)
    }

    /// 계열의 모든 항목을 비활성으로 바꾸고 동기화할 스냅샷을 돌려준다.
    /// 항목은 캐시에 남는다.
    pub fn disable_family(&self, family: RegionFamily) -> Vec<RegionDescriptor> {
        self.restamp_where(|desc| {
            if family.matches(&desc.name) {
                desc.enabled = false;
                true
            } else {
                false
            }
        })
    }

    /// 모든 항목의 블러 강도를 바꾸고 동기화할 스냅샷을 돌려준다.
    pub fn resize_all(&self, size: i32) -> Vec<RegionDescriptor> {
        self.restamp_where(|desc| {
            desc.size = size;
            true
        })
    }

    fn restamp_where(&self, mut f: impl FnMut(&mut RegionDescriptor) -> bool) -> Vec<RegionDescriptor> {
        let mut state = self.state.lock();
        let names: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_live())
            .map(|(name, _)| name.clone())
            .collect();
        let mut changed = Vec::new();
        for name in names {
            let stamp = state.clock + 1;
            let Some(entry) = state.entries.get_mut(&name) else {
                continue;
            };
            if f(&mut entry.desc) {
                entry.desc.last_edit = stamp;
                entry.unsynced = false;
                changed.push(entry.desc.clone());
                state.clock = stamp;
            }
        }
        changed
    }

    /// 큐에서 꺼낸 upsert를 적용해도 되는지.
    /// 살아 있는 항목이 없거나(스윕됨) 캐시 스탬프가 더 새로우면 false.
    pub fn is_current(&self, name: &str, last_edit: u64) -> bool {
        self.state
            .lock()
            .live(name)
            .is_some_and(|entry| entry.desc.last_edit <= last_edit)
    }

    /// 큐에서 꺼낸 삭제가 이후 재등장이나 재시도로 대체되었는지
    pub fn is_superseded(&self, name: &str, last_edit: u64) -> bool {
        self.state
            .lock()
            .entries
            .get(name)
            .is_some_and(|entry| entry.desc.last_edit > last_edit)
    }

    /// 적용 실패 표시. 스탬프가 일치할 때만 표시해 더 새로운 변경을 가리지 않는다.
    pub fn mark_unsynced(&self, name: &str, last_edit: u64) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(name) {
            if entry.is_live() && entry.desc.last_edit == last_edit {
                entry.unsynced = true;
            }
        }
    }

    /// 삭제와 겹쳐 원격 상태를 알 수 없게 된 항목 표시 (스탬프 무관)
    pub fn mark_unsynced_any(&self, name: &str) {
        if let Some(entry) = self.state.lock().entries.get_mut(name) {
            if entry.is_live() {
                entry.unsynced = true;
            }
        }
    }

    /// 캐시된 디스크립터 (묘비 제외)
    pub fn get(&self, name: &str) -> Option<RegionDescriptor> {
        self.state.lock().live(name).map(|e| e.desc.clone())
    }

    /// 캐시에 묘비도 없는 이름인지
    pub fn is_forgotten(&self, name: &str) -> bool {
        !self.state.lock().entries.contains_key(name)
    }

    /// 원격 삭제를 기다리는 묘비 수
    pub fn pending_removals(&self) -> usize {
        self.state.lock().entries.values().filter(|e| !e.is_live()).count()
    }

    /// 모든 항목을 원격 재동기화 대상으로 표시 (재연결 후)
    pub fn invalidate_all(&self) {
        for entry in self.state.lock().entries.values_mut() {
            match entry.removal {
                None => entry.unsynced = true,
                Some(_) => entry.removal = Some(Removal::Retry),
            }
        }
    }

    /// 살아 있는 항목 수
    pub fn len(&self) -> usize {
        self.state.lock().entries.values().filter(|e| e.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
