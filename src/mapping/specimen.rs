use serde_json::{Value, json};
use tracing::debug;

use crate::converters::{sample_type, temperature};
use crate::converters::temperature::{StorageTemperature, TemperatureRange};
use crate::domain::ResourceKind;
use crate::error::TransferError;
use crate::fhir::{
    array, code_of, codings, concept, expect_resource, extension_url, extensions, first_coding,
    meta_with_profile, non_empty, parse_date_time, reference, reference_of, str_at, system_of, value_at,
};
use crate::mapping::{Coded, LinkedId, Mapping};
use crate::profiles::{
    BBMRI_CUSTODIAN, BBMRI_SAMPLE_DIAGNOSIS, BBMRI_SAMPLE_MATERIAL_TYPE, BBMRI_SPECIMEN,
    BBMRI_STORAGE_TEMPERATURE, BBMRI_STORAGE_TEMPERATURE_SYSTEM, ICD_10_GM,
    ICD_10_WHO, ICD_O_3, ICD_O_3_HL7, MII_CUSTODIAN, MII_SPECIMEN, MII_SPECIMEN_DIAGNOSIS,
    MII_TEMPERATURE, SNOMED, SPECIMEN_STORAGE_PROCEDURE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SampleType {
    Bbmri(String),
    Snomed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Storage {
    Bucket(StorageTemperature),
    Range(TemperatureRange),
}

#[derive(Debug, Default)]
pub struct SpecimenMapping {
    id: LinkedId,
    subject: LinkedId,
    sample_type: Option<SampleType>,
    collected: Option<String>,
    body_site: Option<Coded>,
    fasting: Option<Coded>,
    storage: Option<Storage>,
    parents: Vec<String>,
    diagnoses: Vec<Coded>,
    diagnosis_refs: Vec<String>,
    custodian: Option<String>,
}

fn is_icd_o_3(coded: &Coded) -> bool {
    matches!(coded.system.as_deref(), Some(ICD_O_3 | ICD_O_3_HL7))
}

fn is_icd_10(coded: &Coded) -> bool {
    matches!(
        coded.system.as_deref(),
        Some(ICD_10_WHO | ICD_10_GM)
    )
}

fn quantity_value(range: &Value, bound: &str) -> Option<i64> {
    let value = value_at(range, &[bound, "value"])?;
    value.as_i64().or_else(|| value.as_f64().map(|v| v as i64))
}

fn is_storage_step(step: &Value) -> bool {
    codings(step.get("procedure")).any(|coding| {
        system_of(coding) == Some(SNOMED) && code_of(coding) == Some(SPECIMEN_STORAGE_PROCEDURE)
    })
}

/// Temperature of the most recent storage processing step. Steps without a
/// timestamp count as older than any dated step.
fn latest_storage_range(specimen: &Value) -> Option<TemperatureRange> {
    let step = array(specimen.get("processing"))
        .filter(|step| is_storage_step(step))
        .max_by_key(|step| {
            str_at(step, &["timeDateTime"])
                .or_else(|| str_at(step, &["timePeriod", "start"]))
                .and_then(parse_date_time)
        })?;
    let range = extensions(step)
        .find(|extension| extension_url(extension) == Some(MII_TEMPERATURE))
        .and_then(|extension| extension.get("valueRange"))?;
    let range = TemperatureRange {
        high: quantity_value(range, "high"),
        low: quantity_value(range, "low"),
    };
    (!range.is_empty()).then_some(range)
}

fn celsius(value: i64) -> Value {
    json!({
        "value": value,
        "unit": "°C",
        "system": "http://unitsofmeasure.org",
        "code": "Cel",
    })
}

fn extension(url: &str, field: &str, value: Value) -> Value {
    let mut extension = json!({ "url": url });
    extension[field] = value;
    extension
}

impl SpecimenMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_common(&mut self, object: &Value) {
        self.collected = non_empty(str_at(object, &["collection", "collectedDateTime"]));
        self.body_site =
            first_coding(value_at(object, &["collection", "bodySite"])).and_then(Coded::from_coding);
        self.fasting = first_coding(value_at(object, &["collection", "fastingStatusCodeableConcept"]))
            .and_then(Coded::from_coding);
        self.parents = array(object.get("parent"))
            .filter_map(|parent| non_empty(reference_of(Some(parent))))
            .collect();
    }

    fn build(
        &self,
        profile: &str,
        id: Option<&str>,
        subject: Option<&str>,
        body_site: Option<Value>,
    ) -> Value {
        let mut specimen = json!({
            "resourceType": "Specimen",
            "meta": meta_with_profile(profile),
        });
        if let Some(id) = id {
            specimen["id"] = Value::from(id);
        }
        if let Some(subject) = subject {
            specimen["subject"] = reference(subject);
        }
        let mut collection = serde_json::Map::new();
        if let Some(collected) = &self.collected {
            collection.insert("collectedDateTime".into(), Value::from(collected.as_str()));
        }
        if let Some(fasting) = &self.fasting {
            collection.insert(
                "fastingStatusCodeableConcept".into(),
                json!({ "coding": [fasting.to_coding()] }),
            );
        }
        if let Some(site) = body_site {
            collection.insert("bodySite".into(), site);
        }
        if !collection.is_empty() {
            specimen["collection"] = Value::Object(collection);
        }
        specimen
    }
}

impl Mapping for SpecimenMapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError> {
        expect_resource(resource, ResourceKind::Specimen)?;
        self.id.set_bbmri(non_empty(str_at(resource, &["id"])));
        self.subject.set_bbmri(non_empty(reference_of(resource.get("subject"))));
        self.read_common(resource);
        self.sample_type = first_coding(resource.get("type"))
            .and_then(|coding| non_empty(code_of(coding)))
            .map(SampleType::Bbmri);

        for extension in extensions(resource) {
            match extension_url(extension) {
                Some(BBMRI_STORAGE_TEMPERATURE) => {
                    self.storage = first_coding(extension.get("valueCodeableConcept"))
                        .and_then(code_of)
                        .map(|code| Storage::Bucket(StorageTemperature::from_code(code)));
                }
                Some(BBMRI_SAMPLE_DIAGNOSIS) => {
                    self.diagnoses.extend(
                        codings(extension.get("valueCodeableConcept"))
                            .filter_map(Coded::from_coding),
                    );
                }
                Some(BBMRI_CUSTODIAN) => {
                    self.custodian = non_empty(reference_of(extension.get("valueReference")));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError> {
        expect_resource(resource, ResourceKind::Specimen)?;
        self.id.set_mii(non_empty(str_at(resource, &["id"])));
        self.subject.set_mii(non_empty(reference_of(resource.get("subject"))));
        self.read_common(resource);
        self.sample_type = codings(resource.get("type"))
            .find(|coding| system_of(coding) == Some(SNOMED))
            .or_else(|| first_coding(resource.get("type")))
            .and_then(|coding| non_empty(code_of(coding)))
            .map(SampleType::Snomed);
        self.storage = latest_storage_range(resource).map(Storage::Range);

        for extension in extensions(resource) {
            match extension_url(extension) {
                Some(MII_SPECIMEN_DIAGNOSIS) => {
                    if let Some(target) = non_empty(reference_of(extension.get("valueReference"))) {
                        self.diagnosis_refs.push(target);
                    }
                }
                Some(MII_CUSTODIAN) => {
                    self.custodian = non_empty(reference_of(extension.get("valueReference")));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn to_bbmri(&self) -> Result<Option<Value>, TransferError> {
        if !self.parents.is_empty() {
            debug!(id = ?self.id.for_bbmri(), "derived specimen has no bbmri counterpart");
            return Ok(None);
        }
        let body_site = match &self.body_site {
            Some(site) if is_icd_o_3(site) => Some(concept(ICD_O_3, &site.code)),
            Some(site) => {
                debug!(code = %site.code, "body site is only expressible with ICD-O-3 in bbmri");
                None
            }
            None => None,
        };
        let mut specimen = self.build(
            BBMRI_SPECIMEN,
            self.id.for_bbmri(),
            self.subject.for_bbmri(),
            body_site,
        );

        if let Some(kind) = &self.sample_type {
            let code = match kind {
                SampleType::Bbmri(code) => code.as_str(),
                SampleType::Snomed(code) => sample_type::from_mii_to_bbmri(code),
            };
            specimen["type"] = concept(BBMRI_SAMPLE_MATERIAL_TYPE, code);
        }

        let mut extension_list = Vec::new();
        let bucket = match &self.storage {
            Some(Storage::Bucket(bucket)) => Some(*bucket),
            Some(Storage::Range(TemperatureRange {
                high: Some(high),
                low: Some(low),
            })) => Some(StorageTemperature::from_range(*high, *low)),
            Some(Storage::Range(_)) => Some(StorageTemperature::Other),
            None => None,
        };
        if let Some(bucket) = bucket {
            extension_list.push(extension(
                BBMRI_STORAGE_TEMPERATURE,
                "valueCodeableConcept",
                concept(BBMRI_STORAGE_TEMPERATURE_SYSTEM, bucket.code()),
            ));
        }
        let diagnoses: Vec<Value> = self
            .diagnoses
            .iter()
            .filter(|coded| is_icd_10(coded))
            .map(Coded::to_coding)
            .collect();
        if !diagnoses.is_empty() {
            extension_list.push(extension(
                BBMRI_SAMPLE_DIAGNOSIS,
                "valueCodeableConcept",
                json!({ "coding": diagnoses }),
            ));
        }
        if !self.diagnosis_refs.is_empty() {
            debug!(
                count = self.diagnosis_refs.len(),
                "diagnosis references are not carried to bbmri"
            );
        }
        if let Some(custodian) = &self.custodian {
            extension_list.push(extension(BBMRI_CUSTODIAN, "valueReference", reference(custodian)));
        }
        if !extension_list.is_empty() {
            specimen["extension"] = Value::Array(extension_list);
        }
        Ok(Some(specimen))
    }

    fn to_mii(&self) -> Result<Option<Value>, TransferError> {
        let body_site = self
            .body_site
            .as_ref()
            .map(|site| json!({ "coding": [site.to_coding()] }));
        let mut specimen = self.build(
            MII_SPECIMEN,
            self.id.for_mii(),
            self.subject.for_mii(),
            body_site,
        );

        let code = match &self.sample_type {
            Some(SampleType::Snomed(code)) => code.as_str(),
            Some(SampleType::Bbmri(code)) => sample_type::from_bbmri_to_mii(Some(code)),
            None => sample_type::from_bbmri_to_mii(None),
        };
        specimen["type"] = concept(SNOMED, code);

        if !self.parents.is_empty() {
            specimen["parent"] = self.parents.iter().map(|parent| reference(parent)).collect();
        }

        let range = match &self.storage {
            Some(Storage::Bucket(bucket)) => temperature::from_bbmri_to_mii(bucket.code()),
            Some(Storage::Range(range)) => *range,
            None => TemperatureRange::default(),
        };
        if range.is_empty() {
            if self.storage.is_some() {
                debug!("storage temperature has no numeric range");
            }
        } else {
            let mut value_range = serde_json::Map::new();
            if let Some(low) = range.low {
                value_range.insert("low".into(), celsius(low));
            }
            if let Some(high) = range.high {
                value_range.insert("high".into(), celsius(high));
            }
            specimen["processing"] = json!([{
                "procedure": concept(SNOMED, SPECIMEN_STORAGE_PROCEDURE),
                "extension": [extension(MII_TEMPERATURE, "valueRange", Value::Object(value_range))],
            }]);
        }

        let mut extension_list: Vec<Value> = self
            .diagnosis_refs
            .iter()
            .map(|target| extension(MII_SPECIMEN_DIAGNOSIS, "valueReference", reference(target)))
            .collect();
        if !self.diagnoses.is_empty() {
            debug!(
                count = self.diagnoses.len(),
                "coded sample diagnoses have no MII reference"
            );
        }
        if let Some(custodian) = &self.custodian {
            extension_list.push(extension(MII_CUSTODIAN, "valueReference", reference(custodian)));
        }
        if !extension_list.is_empty() {
            specimen["extension"] = Value::Array(extension_list);
        }
        Ok(Some(specimen))
    }
}
