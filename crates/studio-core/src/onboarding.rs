//! Onboarding snapshot stored on a client profile.
//!
//! Conversion pre-fills this from the intake submission so the client's
//! onboarding wizard resumes with the fields already populated. Field names
//! are camelCase on the wire because the wizard reads them as-is.

use crate::model::ContactSubmission;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOW_HEARD: &str = "Contact Form";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingDog {
    pub name: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub sex: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogInfo {
    #[serde(default)]
    pub dogs: Vec<OnboardingDog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingInfo {
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub how_heard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingData {
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub dog_info: DogInfo,
    #[serde(default)]
    pub training_info: TrainingInfo,
}

impl OnboardingData {
    pub fn from_submission(submission: &ContactSubmission, how_heard: &str) -> Self {
        let dogs = if submission.dog.has_name() {
            vec![OnboardingDog {
                name: submission.dog.name.clone().unwrap_or_default(),
                breed: submission.dog.breed.clone().unwrap_or_default(),
                birth_date: submission.dog.birth_date,
                sex: submission.dog.sex.clone().unwrap_or_default(),
            }]
        } else {
            Vec::new()
        };

        Self {
            personal_info: PersonalInfo {
                name: submission.name.clone(),
                email: submission.normalized_email(),
                phone: submission.phone.clone().unwrap_or_default(),
            },
            dog_info: DogInfo { dogs },
            training_info: TrainingInfo {
                goals: submission.message.clone().unwrap_or_default(),
                how_heard: how_heard.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DogDetails;

    #[test]
    fn snapshot_uses_camel_case_blocks() {
        let sub = ContactSubmission::new("Ann Lee", "Ann@X.com")
            .with_phone(Some("555-0100".into()))
            .with_dog(DogDetails {
                name: Some("Rex".into()),
                breed: Some("Collie".into()),
                birth_date: NaiveDate::from_ymd_opt(2022, 3, 1),
                sex: Some("male".into()),
            })
            .with_message(Some("Recall training".into()));

        let data = OnboardingData::from_submission(&sub, DEFAULT_HOW_HEARD);
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["personalInfo"]["email"], "ann@x.com");
        assert_eq!(json["dogInfo"]["dogs"][0]["name"], "Rex");
        assert_eq!(json["dogInfo"]["dogs"][0]["birthDate"], "2022-03-01");
        assert_eq!(json["trainingInfo"]["goals"], "Recall training");
        assert_eq!(json["trainingInfo"]["howHeard"], "Contact Form");
    }

    #[test]
    fn no_dog_name_gives_empty_dog_list() {
        let sub = ContactSubmission::new("Ann", "a@x.com");
        let data = OnboardingData::from_submission(&sub, DEFAULT_HOW_HEARD);
        assert!(data.dog_info.dogs.is_empty());
        assert_eq!(data.training_info.goals, "");
    }
}
