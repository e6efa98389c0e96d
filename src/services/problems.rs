//! Top-down problem detection over a generation.
//!
//! A flagged site suppresses its zones for that data type, and a flagged zone
//! suppresses its devices. Connectivity is checked for every device regardless.

use chrono::{DateTime, Utc};
use log::debug;

use crate::models::graph::{DeviceRef, Generation, Scope, SiteRef, ZoneRef};
use crate::models::problem::{Direction, Problem, ProblemCause, ProblemNames, ProblemScope};
use crate::models::shed::DataType;
use crate::services::analysis::is_fresh;

pub fn detect(generation: &Generation, now: DateTime<Utc>) -> Vec<Problem> {
    let mut problems = Vec::new();
    for site in generation.site_refs() {
        check_site(generation, site, now, &mut problems);
    }
    debug!("Problems: {} found across {} site(s)", problems.len(), generation.sites().len());
    problems
}

fn check_site(generation: &Generation, site: SiteRef, now: DateTime<Utc>, out: &mut Vec<Problem>) {
    for data_type in generation.scope_data_types(Scope::Site(site)) {
        if let Some(direction) = flagged(generation, Scope::Site(site), data_type, now) {
            out.push(site_problem(generation, site, data_type, direction));
            continue;
        }
        for &zone in &generation.site(site).zones {
            if generation.scope_serves(Scope::Zone(zone), data_type) {
                check_zone(generation, zone, data_type, now, out);
            }
        }
    }

    for &device in &generation.site(site).devices {
        let connected = generation
            .device(device)
            .last_connection
            .is_some_and(|ts| is_fresh(ts, now));
        if !connected {
            out.push(device_problem(generation, device, ProblemCause::Connectivity));
        }
    }
}

fn check_zone(generation: &Generation, zone: ZoneRef, data_type: DataType, now: DateTime<Utc>, out: &mut Vec<Problem>) {
    if let Some(direction) = flagged(generation, Scope::Zone(zone), data_type, now) {
        out.push(zone_problem(generation, zone, data_type, direction));
        return;
    }
    for &device in &generation.zone(zone).devices {
        if !generation.device(device).serves(data_type) {
            continue;
        }
        if let Some(direction) = flagged(generation, Scope::Device(device), data_type, now) {
            out.push(device_problem(
                generation,
                device,
                ProblemCause::Reading { data_type, direction },
            ));
        }
    }
}

fn flagged(generation: &Generation, scope: Scope, data_type: DataType, now: DateTime<Utc>) -> Option<Direction> {
    Direction::from_status(generation.status(scope, data_type, now))
}

fn site_problem(generation: &Generation, r: SiteRef, data_type: DataType, direction: Direction) -> Problem {
    let site = generation.site(r);
    Problem {
        scope: ProblemScope::Site { site: site.id.clone() },
        cause: ProblemCause::Reading { data_type, direction },
        names: ProblemNames {
            site: site.name.clone(),
            zone: None,
            device: None,
        },
    }
}

fn zone_problem(generation: &Generation, r: ZoneRef, data_type: DataType, direction: Direction) -> Problem {
    let zone = generation.zone(r);
    let site = generation.site(zone.site);
    Problem {
        scope: ProblemScope::Zone {
            site: site.id.clone(),
            zone: zone.id.clone(),
        },
        cause: ProblemCause::Reading { data_type, direction },
        names: ProblemNames {
            site: site.name.clone(),
            zone: Some(zone.name.clone()),
            device: None,
        },
    }
}

fn device_problem(generation: &Generation, r: DeviceRef, cause: ProblemCause) -> Problem {
    let device = generation.device(r);
    Problem {
        scope: ProblemScope::Device {
            device: device.id.clone(),
        },
        cause,
        names: ProblemNames {
            site: generation.site(device.site).name.clone(),
            zone: Some(generation.zone(device.zone).name.clone()),
            device: Some(device.name.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ideal::Ideal;
    use crate::models::shed::DeviceId;
    use crate::services::testing::{GenerationFixture, noon};

    fn describe(problems: &[Problem]) -> Vec<String> {
        problems
            .iter()
            .map(|p| {
                let scope = match &p.scope {
                    ProblemScope::Site { site } => format!("site:{}", site.0),
                    ProblemScope::Zone { zone, .. } => format!("zone:{}", zone.0),
                    ProblemScope::Device { device } => format!("device:{}", device.0),
                };
                let cause = match p.cause {
                    ProblemCause::Reading { data_type, direction } => format!("{}:{:?}", data_type.label(), direction),
                    ProblemCause::Connectivity => "offline".to_string(),
                };
                format!("{} {}", scope, cause)
            })
            .collect()
    }

    #[test]
    fn flagged_site_suppresses_zones_and_devices() {
        let mut fx = GenerationFixture::new();
        let humidity = Ideal::site("gh1", DataType::Humidity, 30.0, 40.0);
        let site = fx.site("gh1", &[humidity.clone()]);
        let zone = fx.zone(site, "1", &[humidity.clone()]);
        // Both readings steady so nothing is extreme; the site average is 52.5.
        fx.device_with_ideals(zone, "wet", &[humidity.clone()], &[(DataType::Humidity, &[(0, 80.0), (1, 80.0)])]);
        fx.device_with_ideals(zone, "dry", &[humidity], &[(DataType::Humidity, &[(0, 25.0), (1, 25.0)])]);
        let g = fx.generation;

        let problems = detect(&g, noon());
        assert_eq!(describe(&problems), vec!["site:gh1 humidity:Over"]);
    }

    #[test]
    fn flagged_zone_suppresses_only_its_devices() {
        let mut fx = GenerationFixture::new();
        let gas = Ideal::device("x", DataType::Gas, 0.0, 1.0);
        let site = fx.site("gh1", &[]);
        let z1 = fx.zone(site, "1", &[gas.clone()]);
        let z2 = fx.zone(site, "2", &[]);
        fx.device_with_ideals(z1, "a", &[gas.clone()], &[(DataType::Gas, &[(0, 3.0), (1, 3.0)])]);
        fx.device_with_ideals(z2, "b", &[gas], &[(DataType::Gas, &[(0, 4.0), (1, 4.0)])]);
        let g = fx.generation;

        let problems = detect(&g, noon());
        // Site gas is UNKNOWN (no site rule), zone 1 is OVER, zone 2 has no rule so device b is checked.
        assert_eq!(describe(&problems), vec!["zone:1 gas:Over", "device:b gas:Over"]);
    }

    #[test]
    fn flagged_zone_late_suppresses_devices() {
        let mut fx = GenerationFixture::new();
        let humidity = Ideal::device("x", DataType::Humidity, 30.0, 40.0);
        let site = fx.site("gh1", &[]);
        let z1 = fx.zone(site, "1", &[]);
        let z2 = fx.zone(site, "2", &[]);
        let z3 = fx.zone(site, "3", &[]);
        fx.device_with_ideals(z1, "stale", &[humidity.clone()], &[(DataType::Humidity, &[(30, 90.0)])]);
        fx.device_with_ideals(z2, "ok", &[humidity], &[(DataType::Humidity, &[(0, 20.0), (1, 20.0)])]);
        // Zone 3 does not serve humidity and is skipped for it.
        fx.device(z3, "t", Some(0), &[(DataType::Temperature, &[(0, 290.0)])]);
        let g = fx.generation;

        let problems = detect(&g, noon());
        assert_eq!(describe(&problems), vec!["zone:1 humidity:Late", "device:ok humidity:Under"]);
    }

    #[test]
    fn device_extreme_is_reported_at_device_scope() {
        let mut fx = GenerationFixture::new();
        let site = fx.site("gh1", &[]);
        let zone = fx.zone(site, "1", &[]);
        // Mean 22, SD 6: the fresh 40 is outside 22 ± 2·6.
        let spiking: Vec<(i64, f64)> = std::iter::once((0, 40.0)).chain((1..10).map(|m| (m, 20.0))).collect();
        let steady: Vec<(i64, f64)> = (0..10).map(|m| (m, 60.0)).collect();
        fx.device(zone, "a", Some(0), &[(DataType::Humidity, spiking.as_slice())]);
        fx.device(zone, "b", Some(0), &[(DataType::Humidity, steady.as_slice())]);
        let g = fx.generation;

        let problems = detect(&g, noon());
        assert_eq!(describe(&problems), vec!["device:a humidity:Extreme"]);
        assert!(matches!(&problems[0].scope, ProblemScope::Device { device } if *device == DeviceId("a".into())));
    }

    #[test]
    fn ordering_and_unconditional_connectivity() {
        let mut fx = GenerationFixture::new();
        let gh1 = fx.site("gh1", &[Ideal::site("gh1", DataType::Gas, 0.0, 1.0)]);
        let gh2 = fx.site("gh2", &[]);
        let z1 = fx.zone(gh1, "1", &[]);
        let z2 = fx.zone(gh2, "1", &[]);
        fx.device(z1, "gas-1", Some(10), &[(DataType::Gas, &[(0, 5.0), (1, 5.0)])]);
        fx.device(z1, "th-1", None, &[(DataType::Temperature, &[(30, 290.0)])]);
        fx.device(z2, "th-2", Some(6), &[(DataType::Humidity, &[(0, 35.0)])]);
        let g = fx.generation;

        let problems = detect(&g, noon());
        assert_eq!(
            describe(&problems),
            vec![
                "site:gh1 gas:Over",
                "site:gh1 temperature:Late",
                "device:gas-1 offline",
                "device:th-1 offline",
                "device:th-2 offline",
            ]
        );
        // Site-flagged problems still carry the names the wording needs.
        assert_eq!(problems[0].names.site, "Site gh1");
        assert_eq!(problems[4].names.device.as_deref(), Some("Device th-2"));
        assert!(matches!(&problems[4].scope, ProblemScope::Device { device } if *device == DeviceId("th-2".into())));
    }

    #[test]
    fn healthy_network_has_no_problems() {
        let mut fx = GenerationFixture::new();
        let humidity = Ideal::site("gh1", DataType::Humidity, 30.0, 40.0);
        let site = fx.site("gh1", &[humidity.clone()]);
        let zone = fx.zone(site, "1", &[humidity.clone()]);
        fx.device_with_ideals(zone, "a", &[humidity], &[(DataType::Humidity, &[(0, 35.0), (1, 35.0)])]);
        let g = fx.generation;
        assert!(detect(&g, noon()).is_empty());
    }
}
