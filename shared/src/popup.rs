use crate::records::{NestRecord, SpawnRecord};

pub const POKEDEX_BASE_URL: &str = "https://pokemongo.gamepress.gg/pokemon/";
pub const DIRECTIONS_BASE_URL: &str = "https://www.google.com/maps/dir/?api=1&destination=";
/// Spawn duration assumed when the scanner never measured one.
pub const DEFAULT_SPAWN_DURATION_MIN: u32 = 30;
/// Refresh period of an open popup.
pub const POPUP_REFRESH_MS: u32 = 1_000;

/// The map item a popup is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PopupTarget {
    /// Nest registry key (see [`NestRecord::key`]).
    Nest(String),
    /// Index into the spawn overlay's items.
    Spawn(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupContent {
    pub heading: String,
    pub heading_link: Option<Link>,
    pub details: Vec<String>,
    pub directions: Link,
}

pub fn directions_url(lat: f64, lon: f64) -> String {
    format!("{DIRECTIONS_BASE_URL}{lat},{lon}")
}

fn directions_link(lat: f64, lon: f64) -> Link {
    Link {
        label: "Get directions".to_string(),
        href: directions_url(lat, lon),
    }
}

/// Split the backend's `<br>`-joined alternatives into display lines.
pub fn split_alternatives(raw: &str) -> Vec<String> {
    raw.split("<br>")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn nest_popup(nest: &NestRecord) -> PopupContent {
    let heading = nest
        .name
        .clone()
        .unwrap_or_else(|| "Unknown nest".to_string());
    let heading_link = nest.pokemon_id.map(|id| Link {
        label: format!("#{id}"),
        href: format!("{POKEDEX_BASE_URL}{id}"),
    });

    let mut details = vec!["Alternatively:".to_string()];
    match nest.alternatives.as_deref().map(split_alternatives) {
        Some(lines) if !lines.is_empty() => details.extend(lines),
        _ => details.push("None".to_string()),
    }

    PopupContent {
        heading,
        heading_link,
        details,
        directions: directions_link(nest.lat, nest.lon),
    }
}

/// `"12min 5sec"`, or `"??"` when the despawn second is unknown.
pub fn format_despawn(despawn_time: Option<u32>) -> String {
    match despawn_time {
        Some(secs) => format!("{}min {}sec", secs / 60, secs % 60),
        None => "??".to_string(),
    }
}

pub fn format_duration(duration: Option<u32>) -> String {
    format!("{}mn", duration.unwrap_or(DEFAULT_SPAWN_DURATION_MIN))
}

/// Seconds until the clock next reaches `despawn_time` seconds past the hour.
pub fn secs_until_despawn(despawn_time: u32, now_secs: i64) -> u32 {
    let into_hour = now_secs.rem_euclid(3600) as u32;
    let target = despawn_time % 3600;
    (target + 3600 - into_hour) % 3600
}

pub fn spawn_popup(spawn: &SpawnRecord, now_secs: i64) -> PopupContent {
    let mut details = vec![
        format!("despawn: {}", format_despawn(spawn.despawn_time)),
        format!("duration: {}", format_duration(spawn.duration)),
    ];
    if let Some(despawn_time) = spawn.despawn_time {
        let remaining = secs_until_despawn(despawn_time, now_secs);
        details.push(format!(
            "next despawn in {}:{:02}",
            remaining / 60,
            remaining % 60
        ));
    }

    PopupContent {
        heading: format!("Spawn {}", spawn.spawn_id),
        heading_link: None,
        details,
        directions: directions_link(spawn.lat, spawn.lon),
    }
}

/// Owner of the refresh timer of the one open popup.
///
/// Handles are expected to cancel themselves on drop (e.g. `gloo_timers::callback::Interval`),
/// so replacing or closing a popup can never leak its timer.
#[derive(Debug)]
pub struct RefreshSlot<H> {
    active: Option<(PopupTarget, H)>,
}

impl<H> Default for RefreshSlot<H> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<H> RefreshSlot<H> {
    /// Start the cycle for `target`, stopping whichever cycle was running.
    pub fn open(&mut self, target: PopupTarget, handle: H) {
        self.active = None;
        self.active = Some((target, handle));
    }

    /// Stop the running cycle. Returns the target that was open.
    pub fn close(&mut self) -> Option<PopupTarget> {
        self.active.take().map(|(target, _handle)| target)
    }

    pub fn target(&self) -> Option<&PopupTarget> {
        self.active.as_ref().map(|(target, _)| target)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::records::RecordId;

    struct CountingHandle(Rc<Cell<usize>>);

    impl Drop for CountingHandle {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn nest(name: Option<&str>, pokemon_id: Option<u16>, alternatives: Option<&str>) -> NestRecord {
        NestRecord {
            spawn_id: RecordId::Int(4),
            lat: 48.85,
            lon: 2.35,
            id: None,
            pokemon_id,
            name: name.map(str::to_string),
            alternatives: alternatives.map(str::to_string),
        }
    }

    #[test]
    fn despawn_formats_minutes_and_seconds() {
        assert_eq!(format_despawn(Some(725)), "12min 5sec");
        assert_eq!(format_despawn(Some(0)), "0min 0sec");
        assert_eq!(format_despawn(None), "??");
    }

    #[test]
    fn duration_defaults_to_thirty_minutes() {
        assert_eq!(format_duration(None), "30mn");
        assert_eq!(format_duration(Some(60)), "60mn");
    }

    #[test]
    fn despawn_countdown_wraps_at_the_hour() {
        // 10:00:30 UTC, despawn at 00:45 past -> 15s.
        assert_eq!(secs_until_despawn(45, 36_030), 15);
        // Already passed this hour -> next hour.
        assert_eq!(secs_until_despawn(10, 36_030), 3_580);
        assert_eq!(secs_until_despawn(30, 36_030), 0);
    }

    #[test]
    fn nest_popup_links_species_and_lists_alternatives() {
        let content = nest_popup(&nest(
            Some("Magikarp 0.64"),
            Some(129),
            Some("<br>Pidgey 0.20<br>Rattata 0.10"),
        ));
        assert_eq!(content.heading, "Magikarp 0.64");
        assert_eq!(
            content.heading_link,
            Some(Link {
                label: "#129".into(),
                href: "https://pokemongo.gamepress.gg/pokemon/129".into(),
            })
        );
        assert_eq!(
            content.details,
            vec!["Alternatively:", "Pidgey 0.20", "Rattata 0.10"]
        );
        assert_eq!(
            content.directions.href,
            "https://www.google.com/maps/dir/?api=1&destination=48.85,2.35"
        );
    }

    #[test]
    fn nest_popup_without_species_still_renders() {
        let content = nest_popup(&nest(None, None, None));
        assert_eq!(content.heading, "Unknown nest");
        assert_eq!(content.heading_link, None);
        assert_eq!(content.details, vec!["Alternatively:", "None"]);
    }

    #[test]
    fn spawn_popup_marks_unknown_timing() {
        let spawn = SpawnRecord {
            spawn_id: RecordId::Int(99),
            lat: 1.0,
            lon: 2.0,
            despawn_time: None,
            duration: None,
        };
        let content = spawn_popup(&spawn, 0);
        assert_eq!(content.heading, "Spawn 99");
        assert_eq!(content.details, vec!["despawn: ??", "duration: 30mn"]);
    }

    #[test]
    fn spawn_popup_counts_down_to_despawn() {
        let spawn = SpawnRecord {
            spawn_id: RecordId::Int(7),
            lat: 1.0,
            lon: 2.0,
            despawn_time: Some(125),
            duration: Some(60),
        };
        let content = spawn_popup(&spawn, 3_600 + 5);
        assert_eq!(
            content.details,
            vec!["despawn: 2min 5sec", "duration: 60mn", "next despawn in 2:00"]
        );
    }

    #[test]
    fn closing_popup_drops_its_timer() {
        let dropped = Rc::new(Cell::new(0));
        let mut slot = RefreshSlot::default();
        slot.open(PopupTarget::Spawn(3), CountingHandle(dropped.clone()));
        assert!(slot.is_running());
        assert_eq!(dropped.get(), 0);

        assert_eq!(slot.close(), Some(PopupTarget::Spawn(3)));
        assert!(!slot.is_running());
        assert_eq!(dropped.get(), 1);
        assert_eq!(slot.close(), None);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn opening_another_popup_stops_the_previous_timer() {
        let dropped = Rc::new(Cell::new(0));
        let mut slot = RefreshSlot::default();
        slot.open(PopupTarget::Nest("a".into()), CountingHandle(dropped.clone()));
        slot.open(PopupTarget::Nest("b".into()), CountingHandle(dropped.clone()));
        assert_eq!(dropped.get(), 1);
        assert_eq!(slot.target(), Some(&PopupTarget::Nest("b".into())));
    }
}
