use serde_json::Value;

use crate::fhir::{array, code_of, codings, first_coding, has_profile, system_of};

pub const SNOMED: &str = "http://snomed.info/sct";
pub const LOINC: &str = "http://loinc.org";
pub const ICD_10_WHO: &str = "http://hl7.org/fhir/sid/icd-10";
pub const ICD_10_GM: &str = "http://fhir.de/CodeSystem/bfarm/icd-10-gm";
pub const ICD_10_GM_LEGACY: &str = "http://fhir.de/CodeSystem/dimdi/icd-10-gm";
pub const ICD_9: &str = "http://hl7.org/fhir/sid/icd-9";
pub const ICD_O_3: &str = "urn:oid:2.16.840.1.113883.6.43.1";
pub const ICD_O_3_HL7: &str = "http://terminology.hl7.org/CodeSystem/icd-o-3";

pub const BBMRI_PATIENT: &str = "https://fhir.bbmri.de/StructureDefinition/Patient";
pub const BBMRI_SPECIMEN: &str = "https://fhir.bbmri.de/StructureDefinition/Specimen";
pub const BBMRI_CONDITION: &str = "https://fhir.bbmri.de/StructureDefinition/Condition";
pub const BBMRI_CAUSE_OF_DEATH: &str = "https://fhir.bbmri.de/StructureDefinition/CauseOfDeath";
pub const BBMRI_BIOBANK: &str = "https://fhir.bbmri.de/StructureDefinition/Biobank";
pub const BBMRI_COLLECTION: &str = "https://fhir.bbmri.de/StructureDefinition/Collection";

pub const BBMRI_SAMPLE_MATERIAL_TYPE: &str = "https://fhir.bbmri.de/CodeSystem/SampleMaterialType";
pub const BBMRI_STORAGE_TEMPERATURE_SYSTEM: &str =
    "https://fhir.bbmri.de/CodeSystem/StorageTemperature";
pub const BBMRI_STORAGE_TEMPERATURE: &str =
    "https://fhir.bbmri.de/StructureDefinition/StorageTemperature";
pub const BBMRI_SAMPLE_DIAGNOSIS: &str =
    "https://fhir.bbmri.de/StructureDefinition/SampleDiagnosis";
pub const BBMRI_CUSTODIAN: &str = "https://fhir.bbmri.de/StructureDefinition/Custodian";
pub const BBMRI_ORGANIZATION_DESCRIPTION: &str =
    "https://fhir.bbmri.de/StructureDefinition/OrganizationDescription";
pub const BBMRI_CONTACT_ROLE: &str = "https://fhir.bbmri.de/StructureDefinition/ContactRole";
pub const BBMRI_ERIC_ID: &str = "http://www.bbmri-eric.eu/";
pub const CONTACT_ENTITY_TYPE: &str = "http://terminology.hl7.org/CodeSystem/contactentity-type";

pub const MII_PATIENT: &str =
    "https://www.medizininformatik-initiative.de/fhir/core/modul-person/StructureDefinition/Patient";
pub const MII_CAUSE_OF_DEATH: &str = "https://www.medizininformatik-initiative.de/fhir/core/modul-person/StructureDefinition/Todesursache";
pub const MII_DIAGNOSIS: &str = "https://www.medizininformatik-initiative.de/fhir/core/modul-diagnose/StructureDefinition/Diagnose";
pub const MII_SPECIMEN: &str = "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/Specimen";
pub const MII_ORGANIZATION: &str = "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/Organization";
pub const MII_TEMPERATURE: &str = "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/Temperaturbedingungen";
pub const MII_SPECIMEN_DIAGNOSIS: &str =
    "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/Diagnose";
pub const MII_CUSTODIAN: &str = "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/VerwaltendeOrganisation";
pub const MII_COLLECTION_DESCRIPTION: &str = "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/BeschreibungSammlung";
pub const MII_CONTACT_ROLE: &str =
    "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/StructureDefinition/KontaktRolle";
pub const MII_CONTACT_TYPE: &str =
    "https://www.medizininformatik-initiative.de/fhir/ext/modul-biobank/CodeSystem/ContactType";

pub const SPECIMEN_STORAGE_PROCEDURE: &str = "1186936003";

pub const LOINC_CAUSE_OF_DEATH_OBSERVATION: &str = "68343-3";
pub const LOINC_CAUSE_OF_DEATH_CATEGORY: &str = "79378-6";
pub const SNOMED_CAUSE_OF_DEATH_CATEGORY: &str = "16100001";

pub fn is_bbmri_cause_of_death(observation: &Value) -> bool {
    first_coding(observation.get("code")).and_then(code_of)
        == Some(LOINC_CAUSE_OF_DEATH_OBSERVATION)
}

/// An MII cause of death is a Condition with the SNOMED or the LOINC death
/// category code in any of its categories.
pub fn is_mii_cause_of_death(condition: &Value) -> bool {
    array(condition.get("category"))
        .flat_map(|category| codings(Some(category)))
        .any(|coding| {
            matches!(
                (system_of(coding), code_of(coding)),
                (Some(SNOMED), Some(SNOMED_CAUSE_OF_DEATH_CATEGORY))
                    | (Some(LOINC), Some(LOINC_CAUSE_OF_DEATH_CATEGORY))
            )
        })
}

pub fn is_bbmri_biobank(organization: &Value) -> bool {
    has_profile(organization, BBMRI_BIOBANK)
}

pub fn is_bbmri_collection(organization: &Value) -> bool {
    has_profile(organization, BBMRI_COLLECTION)
}
