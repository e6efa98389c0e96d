//! Human wording for detected problems.

use crate::models::problem::{Direction, Problem, ProblemCause, ProblemScope};
use crate::models::shed::DataType;

pub const CONNECTIVITY_MESSAGE: &str = "The device hasn't connected for at least five minutes.";

pub fn describe(problem: &Problem) -> String {
    let (data_type, direction) = match problem.cause {
        ProblemCause::Connectivity => return CONNECTIVITY_MESSAGE.to_string(),
        ProblemCause::Reading { data_type, direction } => (data_type, direction),
    };
    let names = &problem.names;
    let site = names.site.as_str();
    let zone = names.zone.as_deref().unwrap_or(site);
    let label = data_type.label();

    match (&problem.scope, direction) {
        (ProblemScope::Site { .. }, Direction::Over) => match data_type {
            DataType::Gas => format!("{} is too gassy.", site),
            DataType::Moisture => format!("{} is too moist.", site),
            DataType::Light => format!("It's too bright in {}.", site),
            DataType::Temperature => format!("{} is too hot.", site),
            DataType::Humidity => format!("{} is too humid.", site),
            DataType::Solar => format!("The readings in {} are above the specified limits.", site),
        },
        (ProblemScope::Site { .. }, Direction::Under) => match data_type {
            DataType::Gas => format!("{} isn't gassy enough.", site),
            DataType::Moisture => format!("{} is not moist enough.", site),
            DataType::Light => format!("{} needs more light.", site),
            DataType::Temperature => format!("{} is too cold.", site),
            DataType::Humidity => format!("{} is not humid enough.", site),
            DataType::Solar => format!("The readings in {} are below the specified limits.", site),
        },

        (ProblemScope::Zone { .. }, Direction::Over) => match data_type {
            DataType::Gas => format!("The {} in {} is too gassy.", zone, site),
            DataType::Moisture => format!("The {} in {} is too moist.", zone, site),
            DataType::Light => format!("It's too bright in the {} in {}.", zone, site),
            DataType::Temperature => format!("The {} in {} is too hot.", zone, site),
            DataType::Humidity => format!("The {} in {} is too humid.", zone, site),
            DataType::Solar => "The readings are above the specified limits.".to_string(),
        },
        (ProblemScope::Zone { .. }, Direction::Under) => match data_type {
            DataType::Gas => format!("The {} in {} isn't gassy enough.", zone, site),
            DataType::Moisture => format!("The {} in {} is too dry.", zone, site),
            DataType::Light => format!("The {} in {} needs more light.", zone, site),
            DataType::Temperature => format!("The {} in {} is too cold.", zone, site),
            DataType::Humidity => format!("The {} in {} needs to be more humid.", zone, site),
            DataType::Solar => "The readings are below the specified limits.".to_string(),
        },
        // Zone extreme/late reuse the site sentences.
        (ProblemScope::Site { .. } | ProblemScope::Zone { .. }, Direction::Extreme) => {
            format!("{} is reading extreme {} data.", site, label)
        }
        (ProblemScope::Site { .. } | ProblemScope::Zone { .. }, Direction::Late) => {
            format!("{} is not receiving valid {} data.", site, label)
        }

        // Over/under wording names the zone the device sits in.
        (ProblemScope::Device { .. }, Direction::Over) => match data_type {
            DataType::Gas => format!("The {} is too gassy.", zone),
            DataType::Moisture => format!("The {} are too wet.", zone),
            DataType::Light => format!("It's too bright in the {}.", zone),
            DataType::Temperature => format!("The {} is too hot.", zone),
            DataType::Humidity => format!("The {} is too humid.", zone),
            DataType::Solar => "The readings are above the specified limits.".to_string(),
        },
        // Under wording names the device itself.
        (ProblemScope::Device { .. }, Direction::Under) => {
            let device = device_name(problem);
            match data_type {
                DataType::Gas => format!("The {} isn't gassy enough.", device),
                DataType::Moisture => format!("The {} need watering.", device),
                DataType::Light => format!("The {} needs more light.", device),
                DataType::Temperature => format!("The {} is too cold.", device),
                DataType::Humidity => format!("The {} needs to be more humid.", device),
                DataType::Solar => "The readings are below the specified limits.".to_string(),
            }
        }
        (ProblemScope::Device { .. }, Direction::Extreme) => {
            format!("{} is reporting extreme {} data.", device_name(problem), label)
        }
        (ProblemScope::Device { .. }, Direction::Late) => {
            format!("{} is not reporting valid {} data.", device_name(problem), label)
        }
    }
}

fn device_name(problem: &Problem) -> &str {
    match (&problem.names.device, &problem.scope) {
        (Some(name), _) => name,
        (None, ProblemScope::Device { device }) => &device.0,
        (None, _) => &problem.names.site,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::problem::ProblemNames;
    use crate::models::shed::{DeviceId, SiteId, ZoneId};

    fn names() -> ProblemNames {
        ProblemNames {
            site: "Greenhouse 1".into(),
            zone: Some("Tomatoes".into()),
            device: Some("Tomato probe".into()),
        }
    }

    fn reading(scope: ProblemScope, data_type: DataType, direction: Direction) -> Problem {
        Problem {
            scope,
            cause: ProblemCause::Reading { data_type, direction },
            names: names(),
        }
    }

    #[test]
    fn wording_depends_on_scope_type_and_direction() {
        let site = ProblemScope::Site {
            site: SiteId("gh1".into()),
        };
        let zone = ProblemScope::Zone {
            site: SiteId("gh1".into()),
            zone: ZoneId("1".into()),
        };
        let device = ProblemScope::Device {
            device: DeviceId("th-1".into()),
        };

        assert_eq!(
            reading(site.clone(), DataType::Humidity, Direction::Over).message(),
            "Greenhouse 1 is too humid."
        );
        assert_eq!(
            reading(site, DataType::Light, Direction::Late).message(),
            "Greenhouse 1 is not receiving valid light data."
        );
        assert_eq!(
            reading(zone.clone(), DataType::Moisture, Direction::Under).message(),
            "The Tomatoes in Greenhouse 1 is too dry."
        );
        assert_eq!(
            reading(zone.clone(), DataType::Humidity, Direction::Late).message(),
            "Greenhouse 1 is not receiving valid humidity data."
        );
        assert_eq!(
            reading(zone.clone(), DataType::Gas, Direction::Extreme).message(),
            "Greenhouse 1 is reading extreme gas data."
        );
        assert_eq!(
            reading(device.clone(), DataType::Moisture, Direction::Over).message(),
            "The Tomatoes are too wet."
        );
        assert_eq!(
            reading(device.clone(), DataType::Temperature, Direction::Under).message(),
            "The Tomato probe is too cold."
        );
        assert_eq!(
            reading(device.clone(), DataType::Temperature, Direction::Extreme).message(),
            "Tomato probe is reporting extreme temperature data."
        );

        let offline = Problem {
            scope: device,
            cause: ProblemCause::Connectivity,
            names: names(),
        };
        assert_eq!(offline.message(), CONNECTIVITY_MESSAGE);
    }
}
