use serde_json::{Map, Value, json};

use crate::domain::ResourceKind;
use crate::error::TransferError;
use crate::fhir::{
    array, concept, expect_resource, extension_value, meta_with_profile, non_empty, str_at,
};
use crate::mapping::Mapping;
use crate::profiles::{
    BBMRI_BIOBANK, BBMRI_CONTACT_ROLE, BBMRI_ERIC_ID, BBMRI_ORGANIZATION_DESCRIPTION,
    CONTACT_ENTITY_TYPE, MII_COLLECTION_DESCRIPTION, MII_CONTACT_ROLE, MII_CONTACT_TYPE,
    MII_ORGANIZATION,
};

const PURPOSE_RESEARCH: &str = "RESEARCH";
const PURPOSE_ADMIN: &str = "ADMIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Bbmri,
    Mii,
}

impl Dialect {
    fn description_url(self) -> &'static str {
        match self {
            Dialect::Bbmri => BBMRI_ORGANIZATION_DESCRIPTION,
            Dialect::Mii => MII_COLLECTION_DESCRIPTION,
        }
    }

    fn role_url(self) -> &'static str {
        match self {
            Dialect::Bbmri => BBMRI_CONTACT_ROLE,
            Dialect::Mii => MII_CONTACT_ROLE,
        }
    }

    fn purpose_system(self) -> &'static str {
        match self {
            Dialect::Bbmri => CONTACT_ENTITY_TYPE,
            Dialect::Mii => MII_CONTACT_TYPE,
        }
    }
}

/// Contact roles are held in bbmri terms; MII only renames the director.
fn role_from_mii(role: &str) -> String {
    match role {
        "Direktor" => "Director".to_string(),
        other => other.to_string(),
    }
}

fn role_to_mii(role: &str) -> String {
    match role {
        "Director" => "Direktor".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Address {
    lines: Vec<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Contact {
    family: Option<String>,
    given: Vec<String>,
    telecom: Vec<Value>,
    address: Option<Address>,
    role: Option<String>,
}

impl Contact {
    fn read(contact: &Value, dialect: Dialect) -> Self {
        let strings = |value: Option<&Value>| -> Vec<String> {
            array(value).filter_map(|item| non_empty(item.as_str())).collect()
        };
        let address = contact.get("address").map(|address| Address {
            lines: strings(address.get("line")),
            city: non_empty(str_at(address, &["city"])),
            postal_code: non_empty(str_at(address, &["postalCode"])),
            country: non_empty(str_at(address, &["country"])),
        });
        let role = extension_value(contact, dialect.role_url(), "valueString")
            .and_then(Value::as_str)
            .and_then(|role| non_empty(Some(role)))
            .map(|role| match dialect {
                Dialect::Bbmri => role,
                Dialect::Mii => role_from_mii(&role),
            });
        Self {
            family: non_empty(str_at(contact, &["name", "family"])),
            given: strings(contact.get("name").and_then(|name| name.get("given"))),
            telecom: array(contact.get("telecom")).cloned().collect(),
            address,
            role,
        }
    }

    fn write(&self, dialect: Dialect) -> Value {
        let purpose = if self.role.is_some() {
            PURPOSE_ADMIN
        } else {
            PURPOSE_RESEARCH
        };
        let mut contact = json!({ "purpose": concept(dialect.purpose_system(), purpose) });

        let mut name = Map::new();
        if let Some(family) = &self.family {
            name.insert("family".into(), Value::from(family.as_str()));
        }
        if !self.given.is_empty() {
            name.insert("given".into(), json!(self.given));
        }
        if !name.is_empty() {
            contact["name"] = Value::Object(name);
        }
        if !self.telecom.is_empty() {
            contact["telecom"] = Value::Array(self.telecom.clone());
        }
        if let Some(address) = &self.address {
            let mut fields = Map::new();
            if !address.lines.is_empty() {
                fields.insert("line".into(), json!(address.lines));
            }
            for (key, value) in [
                ("city", &address.city),
                ("postalCode", &address.postal_code),
                ("country", &address.country),
            ] {
                if let Some(value) = value {
                    fields.insert(key.into(), Value::from(value.as_str()));
                }
            }
            contact["address"] = Value::Object(fields);
        }
        if let Some(role) = &self.role {
            let role = match dialect {
                Dialect::Bbmri => role.clone(),
                Dialect::Mii => role_to_mii(role),
            };
            contact["extension"] = json!([{ "url": dialect.role_url(), "valueString": role }]);
        }
        contact
    }
}

#[derive(Debug, Default)]
pub struct BiobankMapping {
    id: Option<String>,
    registry_id: Option<String>,
    name: Option<String>,
    aliases: Vec<String>,
    description: Option<String>,
    contacts: Vec<Contact>,
}

impl BiobankMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&mut self, resource: &Value, dialect: Dialect) -> Result<(), TransferError> {
        expect_resource(resource, ResourceKind::Organization)?;
        self.id = non_empty(str_at(resource, &["id"]));
        self.registry_id = array(resource.get("identifier"))
            .find(|identifier| str_at(identifier, &["system"]) == Some(BBMRI_ERIC_ID))
            .and_then(|identifier| non_empty(str_at(identifier, &["value"])));
        self.name = non_empty(str_at(resource, &["name"]));
        self.aliases = array(resource.get("alias"))
            .filter_map(|alias| non_empty(alias.as_str()))
            .collect();
        self.description = extension_value(resource, dialect.description_url(), "valueString")
            .and_then(|description| non_empty(description.as_str()));
        self.contacts = array(resource.get("contact"))
            .map(|contact| Contact::read(contact, dialect))
            .collect();
        Ok(())
    }

    pub(crate) fn write(&self, profile: &str, dialect: Dialect) -> Value {
        let mut organization = json!({
            "resourceType": "Organization",
            "meta": meta_with_profile(profile),
        });
        if let Some(id) = &self.id {
            organization["id"] = Value::from(id.as_str());
        }
        if let Some(registry_id) = &self.registry_id {
            organization["identifier"] = json!([{ "system": BBMRI_ERIC_ID, "value": registry_id }]);
        }
        if let Some(name) = &self.name {
            organization["name"] = Value::from(name.as_str());
        }
        if !self.aliases.is_empty() {
            organization["alias"] = json!(self.aliases);
        }
        if let Some(description) = &self.description {
            organization["extension"] = json!([{
                "url": dialect.description_url(),
                "valueString": description,
            }]);
        }
        if !self.contacts.is_empty() {
            organization["contact"] = self
                .contacts
                .iter()
                .map(|contact| contact.write(dialect))
                .collect();
        }
        organization
    }
}

impl Mapping for BiobankMapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError> {
        self.read(resource, Dialect::Bbmri)
    }

    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError> {
        self.read(resource, Dialect::Mii)
    }

    fn to_bbmri(&self) -> Result<Option<Value>, TransferError> {
        Ok(Some(self.write(BBMRI_BIOBANK, Dialect::Bbmri)))
    }

    fn to_mii(&self) -> Result<Option<Value>, TransferError> {
        Ok(Some(self.write(MII_ORGANIZATION, Dialect::Mii)))
    }
}
