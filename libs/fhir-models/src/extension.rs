//! Extension registry
//!
//! Every extension the registration workflow understands is listed in
//! [`ExtensionUrl`] together with the value shape it must carry. JSON coming
//! in from clients is checked against that shape when it is deserialized, so
//! a `regLastUser` without a `valueReference` never reaches the pipeline.
//!
//! Task and Patient extensions are held in an [`ExtensionList`]: a URL-keyed
//! map that serializes back to the ordered FHIR array.

use crate::common::complex::{Attachment, CodeableConcept, Period, Reference, Signature};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use phf::phf_map;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Value shape an extension URL is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// No value; presence is the information
    Marker,
    String,
    /// `valueString` allowed but not required
    OptionalString,
    Integer,
    Boolean,
    DateTime,
    Reference,
    Attachment,
    Signature,
    /// Nested `extension` array
    Nested,
}

impl ValueShape {
    fn describe(&self) -> &'static str {
        match self {
            ValueShape::Marker => "no value",
            ValueShape::String => "valueString",
            ValueShape::OptionalString => "optional valueString",
            ValueShape::Integer => "valueInteger",
            ValueShape::Boolean => "valueBoolean",
            ValueShape::DateTime => "valueDateTime",
            ValueShape::Reference => "valueReference",
            ValueShape::Attachment => "valueAttachment",
            ValueShape::Signature => "valueSignature",
            ValueShape::Nested => "extension",
        }
    }
}

/// Catalog of known extension URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionUrl {
    RegDownloaded,
    RegReinstated,
    RegAssigned,
    RegVerified,
    RegUnassigned,
    RegViewed,
    RegLastUser,
    RegLastLocation,
    RegLastOffice,
    MakeCorrection,
    OtherReason,
    RequestingIndividual,
    RequestingIndividualOther,
    HasShowedVerifiedDocument,
    PaymentDetails,
    Payment,
    NoSupportingDocumentationRequired,
    MarkedAsNotDuplicate,
    MarkedAsDuplicate,
    DuplicateTrackingId,
    FlaggedAsPotentialDuplicate,
    EducationalAttainment,
    Age,
    AgeOfIndividualInYears,
    PatientOccupation,
    ReasonNotApplying,
    ContactPerson,
    ContactRelationship,
    ContactPersonPhoneNumber,
    ContactPersonEmail,
    InformantsSignature,
    GroomSignature,
    BrideSignature,
    WitnessOneSignature,
    WitnessTwoSignature,
    EmployeeSignature,
    InCompleteFields,
    Collector,
    DateOfMarriage,
    TimeLoggedMs,
    StatisticsMalePopulations,
    StatisticsFemalePopulations,
    StatisticsTotalPopulations,
    StatisticsCrudeBirthRates,
    LocationBoundaryGeojson,
    PatientNationality,
}

static URL_LOOKUP: phf::Map<&'static str, ExtensionUrl> = phf_map! {
    "http://opencrvs.org/specs/extension/regDownloaded" => ExtensionUrl::RegDownloaded,
    "http://opencrvs.org/specs/extension/regReinstated" => ExtensionUrl::RegReinstated,
    "http://opencrvs.org/specs/extension/regAssigned" => ExtensionUrl::RegAssigned,
    "http://opencrvs.org/specs/extension/regVerified" => ExtensionUrl::RegVerified,
    "http://opencrvs.org/specs/extension/regUnassigned" => ExtensionUrl::RegUnassigned,
    "http://opencrvs.org/specs/extension/regViewed" => ExtensionUrl::RegViewed,
    "http://opencrvs.org/specs/extension/regLastUser" => ExtensionUrl::RegLastUser,
    "http://opencrvs.org/specs/extension/regLastLocation" => ExtensionUrl::RegLastLocation,
    "http://opencrvs.org/specs/extension/regLastOffice" => ExtensionUrl::RegLastOffice,
    "http://opencrvs.org/specs/extension/makeCorrection" => ExtensionUrl::MakeCorrection,
    "http://opencrvs.org/specs/extension/otherReason" => ExtensionUrl::OtherReason,
    "http://opencrvs.org/specs/extension/requestingIndividual" => ExtensionUrl::RequestingIndividual,
    "http://opencrvs.org/specs/extension/requestingIndividualOther" => ExtensionUrl::RequestingIndividualOther,
    "http://opencrvs.org/specs/extension/hasShowedVerifiedDocument" => ExtensionUrl::HasShowedVerifiedDocument,
    "http://opencrvs.org/specs/extension/paymentDetails" => ExtensionUrl::PaymentDetails,
    "http://opencrvs.org/specs/extension/payment" => ExtensionUrl::Payment,
    "http://opencrvs.org/specs/extension/noSupportingDocumentationRequired" => ExtensionUrl::NoSupportingDocumentationRequired,
    "http://opencrvs.org/specs/extension/markedAsNotDuplicate" => ExtensionUrl::MarkedAsNotDuplicate,
    "http://opencrvs.org/specs/extension/markedAsDuplicate" => ExtensionUrl::MarkedAsDuplicate,
    "http://opencrvs.org/specs/extension/duplicateTrackingId" => ExtensionUrl::DuplicateTrackingId,
    "http://opencrvs.org/specs/extension/flaggedAsPotentialDuplicate" => ExtensionUrl::FlaggedAsPotentialDuplicate,
    "http://opencrvs.org/specs/extension/educational-attainment" => ExtensionUrl::EducationalAttainment,
    "http://opencrvs.org/specs/extension/age" => ExtensionUrl::Age,
    "http://opencrvs.org/specs/extension/age-of-individual-in-years" => ExtensionUrl::AgeOfIndividualInYears,
    "http://opencrvs.org/specs/extension/patient-occupation" => ExtensionUrl::PatientOccupation,
    "http://opencrvs.org/specs/extension/reason-not-applying" => ExtensionUrl::ReasonNotApplying,
    "http://opencrvs.org/specs/extension/contact-person" => ExtensionUrl::ContactPerson,
    "http://opencrvs.org/specs/extension/contact-relationship" => ExtensionUrl::ContactRelationship,
    "http://opencrvs.org/specs/extension/contact-person-phone-number" => ExtensionUrl::ContactPersonPhoneNumber,
    "http://opencrvs.org/specs/extension/contact-person-email" => ExtensionUrl::ContactPersonEmail,
    "http://opencrvs.org/specs/extension/informants-signature" => ExtensionUrl::InformantsSignature,
    "http://opencrvs.org/specs/extension/groom-signature" => ExtensionUrl::GroomSignature,
    "http://opencrvs.org/specs/extension/bride-signature" => ExtensionUrl::BrideSignature,
    "http://opencrvs.org/specs/extension/witness-one-signature" => ExtensionUrl::WitnessOneSignature,
    "http://opencrvs.org/specs/extension/witness-two-signature" => ExtensionUrl::WitnessTwoSignature,
    "http://opencrvs.org/specs/extension/employee-signature" => ExtensionUrl::EmployeeSignature,
    "http://opencrvs.org/specs/extension/in-complete-fields" => ExtensionUrl::InCompleteFields,
    "http://opencrvs.org/specs/extension/collector" => ExtensionUrl::Collector,
    "http://opencrvs.org/specs/extension/date-of-marriage" => ExtensionUrl::DateOfMarriage,
    "http://opencrvs.org/specs/extension/timeLoggedMS" => ExtensionUrl::TimeLoggedMs,
    "http://opencrvs.org/specs/id/statistics-male-populations" => ExtensionUrl::StatisticsMalePopulations,
    "http://opencrvs.org/specs/id/statistics-female-populations" => ExtensionUrl::StatisticsFemalePopulations,
    "http://opencrvs.org/specs/id/statistics-total-populations" => ExtensionUrl::StatisticsTotalPopulations,
    "http://opencrvs.org/specs/id/statistics-crude-birth-rates" => ExtensionUrl::StatisticsCrudeBirthRates,
    "http://hl7.org/fhir/StructureDefinition/location-boundary-geojson" => ExtensionUrl::LocationBoundaryGeojson,
    "http://hl7.org/fhir/StructureDefinition/patient-nationality" => ExtensionUrl::PatientNationality,
};

impl ExtensionUrl {
    /// Look up a URL in the catalog
    pub fn from_url(url: &str) -> Option<Self> {
        URL_LOOKUP.get(url).copied()
    }

    pub fn url(&self) -> &'static str {
        use ExtensionUrl::*;
        match self {
            RegDownloaded => "http://opencrvs.org/specs/extension/regDownloaded",
            RegReinstated => "http://opencrvs.org/specs/extension/regReinstated",
            RegAssigned => "http://opencrvs.org/specs/extension/regAssigned",
            RegVerified => "http://opencrvs.org/specs/extension/regVerified",
            RegUnassigned => "http://opencrvs.org/specs/extension/regUnassigned",
            RegViewed => "http://opencrvs.org/specs/extension/regViewed",
            RegLastUser => "http://opencrvs.org/specs/extension/regLastUser",
            RegLastLocation => "http://opencrvs.org/specs/extension/regLastLocation",
            RegLastOffice => "http://opencrvs.org/specs/extension/regLastOffice",
            MakeCorrection => "http://opencrvs.org/specs/extension/makeCorrection",
            OtherReason => "http://opencrvs.org/specs/extension/otherReason",
            RequestingIndividual => "http://opencrvs.org/specs/extension/requestingIndividual",
            RequestingIndividualOther => "http://opencrvs.org/specs/extension/requestingIndividualOther",
            HasShowedVerifiedDocument => "http://opencrvs.org/specs/extension/hasShowedVerifiedDocument",
            PaymentDetails => "http://opencrvs.org/specs/extension/paymentDetails",
            Payment => "http://opencrvs.org/specs/extension/payment",
            NoSupportingDocumentationRequired => "http://opencrvs.org/specs/extension/noSupportingDocumentationRequired",
            MarkedAsNotDuplicate => "http://opencrvs.org/specs/extension/markedAsNotDuplicate",
            MarkedAsDuplicate => "http://opencrvs.org/specs/extension/markedAsDuplicate",
            DuplicateTrackingId => "http://opencrvs.org/specs/extension/duplicateTrackingId",
            FlaggedAsPotentialDuplicate => "http://opencrvs.org/specs/extension/flaggedAsPotentialDuplicate",
            EducationalAttainment => "http://opencrvs.org/specs/extension/educational-attainment",
            Age => "http://opencrvs.org/specs/extension/age",
            AgeOfIndividualInYears => "http://opencrvs.org/specs/extension/age-of-individual-in-years",
            PatientOccupation => "http://opencrvs.org/specs/extension/patient-occupation",
            ReasonNotApplying => "http://opencrvs.org/specs/extension/reason-not-applying",
            ContactPerson => "http://opencrvs.org/specs/extension/contact-person",
            ContactRelationship => "http://opencrvs.org/specs/extension/contact-relationship",
            ContactPersonPhoneNumber => "http://opencrvs.org/specs/extension/contact-person-phone-number",
            ContactPersonEmail => "http://opencrvs.org/specs/extension/contact-person-email",
            InformantsSignature => "http://opencrvs.org/specs/extension/informants-signature",
            GroomSignature => "http://opencrvs.org/specs/extension/groom-signature",
            BrideSignature => "http://opencrvs.org/specs/extension/bride-signature",
            WitnessOneSignature => "http://opencrvs.org/specs/extension/witness-one-signature",
            WitnessTwoSignature => "http://opencrvs.org/specs/extension/witness-two-signature",
            EmployeeSignature => "http://opencrvs.org/specs/extension/employee-signature",
            InCompleteFields => "http://opencrvs.org/specs/extension/in-complete-fields",
            Collector => "http://opencrvs.org/specs/extension/collector",
            DateOfMarriage => "http://opencrvs.org/specs/extension/date-of-marriage",
            TimeLoggedMs => "http://opencrvs.org/specs/extension/timeLoggedMS",
            StatisticsMalePopulations => "http://opencrvs.org/specs/id/statistics-male-populations",
            StatisticsFemalePopulations => "http://opencrvs.org/specs/id/statistics-female-populations",
            StatisticsTotalPopulations => "http://opencrvs.org/specs/id/statistics-total-populations",
            StatisticsCrudeBirthRates => "http://opencrvs.org/specs/id/statistics-crude-birth-rates",
            LocationBoundaryGeojson => "http://hl7.org/fhir/StructureDefinition/location-boundary-geojson",
            PatientNationality => "http://hl7.org/fhir/StructureDefinition/patient-nationality",
        }
    }

    pub fn shape(&self) -> ValueShape {
        use ExtensionUrl::*;
        match self {
            RegReinstated | RegAssigned | RegUnassigned | RegViewed | MarkedAsNotDuplicate => {
                ValueShape::Marker
            }
            RegDownloaded | MarkedAsDuplicate => ValueShape::OptionalString,
            RegLastUser | RegLastLocation | RegLastOffice | PaymentDetails | Payment
            | Collector => ValueShape::Reference,
            HasShowedVerifiedDocument | NoSupportingDocumentationRequired => ValueShape::Boolean,
            Age | AgeOfIndividualInYears | TimeLoggedMs => ValueShape::Integer,
            DateOfMarriage => ValueShape::DateTime,
            EmployeeSignature => ValueShape::Signature,
            LocationBoundaryGeojson => ValueShape::Attachment,
            PatientNationality => ValueShape::Nested,
            _ => ValueShape::String,
        }
    }

    /// Singleton extensions appear at most once; writing one replaces the old entry.
    pub fn is_singleton(&self) -> bool {
        !matches!(
            self.shape(),
            ValueShape::Marker | ValueShape::OptionalString
        ) && !matches!(self, ExtensionUrl::RegVerified)
    }
}

/// Typed value carried by an extension
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    None,
    String(String),
    Integer(i64),
    Boolean(bool),
    DateTime(String),
    Reference(Reference),
    Attachment(Attachment),
    Signature(Signature),
    CodeableConcept(CodeableConcept),
    Period(Period),
    Nested(Vec<Extension>),
}

/// A single FHIR extension
///
/// `label` holds a `valueString` that travels next to a non-string value,
/// e.g. the office name on `regLastOffice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireExtension", into = "WireExtension")]
pub struct Extension {
    pub url: String,
    pub value: ExtensionValue,
    pub label: Option<String>,
}

impl Extension {
    pub fn new(url: impl Into<String>, value: ExtensionValue) -> Self {
        Self {
            url: url.into(),
            value,
            label: None,
        }
    }

    pub fn marker(url: ExtensionUrl) -> Self {
        Self::new(url.url(), ExtensionValue::None)
    }

    pub fn string(url: ExtensionUrl, value: impl Into<String>) -> Self {
        Self::new(url.url(), ExtensionValue::String(value.into()))
    }

    pub fn reference(url: ExtensionUrl, reference: impl Into<String>) -> Self {
        Self::new(url.url(), ExtensionValue::Reference(Reference::new(reference)))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Catalog entry for this extension's URL, if known
    pub fn known_url(&self) -> Option<ExtensionUrl> {
        ExtensionUrl::from_url(&self.url)
    }

    /// String value, falling back to the label for non-string shapes
    pub fn value_string(&self) -> Option<&str> {
        match &self.value {
            ExtensionValue::String(s) => Some(s),
            _ => self.label.as_deref(),
        }
    }

    pub fn value_reference(&self) -> Option<&str> {
        match &self.value {
            ExtensionValue::Reference(r) => r.reference.as_deref(),
            _ => None,
        }
    }

    pub fn nested(&self) -> &[Extension] {
        match &self.value {
            ExtensionValue::Nested(children) => children,
            _ => &[],
        }
    }

    /// Check the value against the catalog shape; unknown URLs always pass.
    pub fn validate(&self) -> Result<()> {
        let Some(known) = self.known_url() else {
            return Ok(());
        };
        let shape = known.shape();
        let ok = match (shape, &self.value) {
            (ValueShape::Marker, ExtensionValue::None) => true,
            (ValueShape::String, ExtensionValue::String(_)) => true,
            (ValueShape::OptionalString, ExtensionValue::String(_) | ExtensionValue::None) => {
                true
            }
            (ValueShape::Integer, ExtensionValue::Integer(_)) => true,
            (ValueShape::Boolean, ExtensionValue::Boolean(_)) => true,
            (ValueShape::DateTime, ExtensionValue::DateTime(_)) => true,
            (ValueShape::Reference, ExtensionValue::Reference(r)) => r.reference.is_some(),
            (ValueShape::Attachment, ExtensionValue::Attachment(_)) => true,
            (ValueShape::Signature, ExtensionValue::Signature(_)) => true,
            (ValueShape::Nested, ExtensionValue::Nested(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::ExtensionShape {
                url: self.url.clone(),
                expected: shape.describe(),
                found: describe_value(&self.value).to_string(),
            })
        }
    }
}

fn describe_value(value: &ExtensionValue) -> &'static str {
    match value {
        ExtensionValue::None => "no value",
        ExtensionValue::String(_) => "valueString",
        ExtensionValue::Integer(_) => "valueInteger",
        ExtensionValue::Boolean(_) => "valueBoolean",
        ExtensionValue::DateTime(_) => "valueDateTime",
        ExtensionValue::Reference(_) => "valueReference",
        ExtensionValue::Attachment(_) => "valueAttachment",
        ExtensionValue::Signature(_) => "valueSignature",
        ExtensionValue::CodeableConcept(_) => "valueCodeableConcept",
        ExtensionValue::Period(_) => "valuePeriod",
        ExtensionValue::Nested(_) => "extension",
    }
}

/// First extension with the given URL, searching nested arrays after the top level.
///
/// Absence is a normal state and yields `None`.
pub fn find_extension<'a>(url: &str, extensions: &'a [Extension]) -> Option<&'a Extension> {
    extensions
        .iter()
        .find(|ext| ext.url == url)
        .or_else(|| {
            extensions
                .iter()
                .find_map(|ext| find_extension(url, ext.nested()))
        })
}

/// JSON shape of an extension on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireExtension {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_integer: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_boolean: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_attachment: Option<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_signature: Option<Signature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_codeable_concept: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_period: Option<Period>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extension: Vec<Extension>,
}

impl WireExtension {
    fn shape_error(self, shape: ValueShape) -> Error {
        let mut found: Vec<&str> = Vec::new();
        if self.value_string.is_some() {
            found.push("valueString");
        }
        if self.value_integer.is_some() {
            found.push("valueInteger");
        }
        if self.value_boolean.is_some() {
            found.push("valueBoolean");
        }
        if self.value_date_time.is_some() {
            found.push("valueDateTime");
        }
        if self.value_reference.is_some() {
            found.push("valueReference");
        }
        if self.value_attachment.is_some() {
            found.push("valueAttachment");
        }
        if self.value_signature.is_some() {
            found.push("valueSignature");
        }
        if !self.extension.is_empty() {
            found.push("extension");
        }
        Error::ExtensionShape {
            url: self.url,
            expected: shape.describe(),
            found: if found.is_empty() {
                "no value".to_string()
            } else {
                found.join(", ")
            },
        }
    }

    fn into_shaped(self, shape: ValueShape) -> Result<Extension> {
        let label = self.value_string.clone();
        let (value, label) = match shape {
            ValueShape::Marker => (ExtensionValue::None, label),
            ValueShape::String => match self.value_string.clone() {
                Some(s) => (ExtensionValue::String(s), None),
                None => return Err(self.shape_error(shape)),
            },
            ValueShape::OptionalString => match self.value_string.clone() {
                Some(s) => (ExtensionValue::String(s), None),
                None => (ExtensionValue::None, None),
            },
            ValueShape::Integer => match self.value_integer {
                Some(i) => (ExtensionValue::Integer(i), label),
                None => return Err(self.shape_error(shape)),
            },
            ValueShape::Boolean => match self.value_boolean {
                Some(b) => (ExtensionValue::Boolean(b), label),
                None => return Err(self.shape_error(shape)),
            },
            ValueShape::DateTime => match self.value_date_time.clone() {
                Some(d) => (ExtensionValue::DateTime(d), label),
                None => return Err(self.shape_error(shape)),
            },
            ValueShape::Reference => match self.value_reference.clone() {
                Some(r) if r.reference.is_some() => (ExtensionValue::Reference(r), label),
                _ => return Err(self.shape_error(shape)),
            },
            ValueShape::Attachment => match self.value_attachment.clone() {
                Some(a) => (ExtensionValue::Attachment(a), label),
                None => return Err(self.shape_error(shape)),
            },
            ValueShape::Signature => match self.value_signature.clone() {
                Some(s) => (ExtensionValue::Signature(s), label),
                None => return Err(self.shape_error(shape)),
            },
            ValueShape::Nested => (ExtensionValue::Nested(self.extension.clone()), label),
        };
        Ok(Extension {
            url: self.url,
            value,
            label,
        })
    }

    fn into_inferred(self) -> Extension {
        let label = self.value_string.clone();
        let value = if let Some(r) = self.value_reference {
            ExtensionValue::Reference(r)
        } else if let Some(i) = self.value_integer {
            ExtensionValue::Integer(i)
        } else if let Some(b) = self.value_boolean {
            ExtensionValue::Boolean(b)
        } else if let Some(d) = self.value_date_time {
            ExtensionValue::DateTime(d)
        } else if let Some(a) = self.value_attachment {
            ExtensionValue::Attachment(a)
        } else if let Some(s) = self.value_signature {
            ExtensionValue::Signature(s)
        } else if let Some(c) = self.value_codeable_concept {
            ExtensionValue::CodeableConcept(c)
        } else if let Some(p) = self.value_period {
            ExtensionValue::Period(p)
        } else if !self.extension.is_empty() {
            ExtensionValue::Nested(self.extension)
        } else if let Some(s) = self.value_string {
            return Extension {
                url: self.url,
                value: ExtensionValue::String(s),
                label: None,
            };
        } else {
            ExtensionValue::None
        };
        Extension {
            url: self.url,
            value,
            label,
        }
    }
}

impl TryFrom<WireExtension> for Extension {
    type Error = Error;

    fn try_from(wire: WireExtension) -> Result<Self> {
        match ExtensionUrl::from_url(&wire.url) {
            Some(known) => wire.into_shaped(known.shape()),
            None => Ok(wire.into_inferred()),
        }
    }
}

impl From<Extension> for WireExtension {
    fn from(ext: Extension) -> Self {
        let mut wire = WireExtension {
            url: ext.url,
            value_string: ext.label,
            ..Default::default()
        };
        match ext.value {
            ExtensionValue::None => {}
            ExtensionValue::String(s) => wire.value_string = Some(s),
            ExtensionValue::Integer(i) => wire.value_integer = Some(i),
            ExtensionValue::Boolean(b) => wire.value_boolean = Some(b),
            ExtensionValue::DateTime(d) => wire.value_date_time = Some(d),
            ExtensionValue::Reference(r) => wire.value_reference = Some(r),
            ExtensionValue::Attachment(a) => wire.value_attachment = Some(a),
            ExtensionValue::Signature(s) => wire.value_signature = Some(s),
            ExtensionValue::CodeableConcept(c) => wire.value_codeable_concept = Some(c),
            ExtensionValue::Period(p) => wire.value_period = Some(p),
            ExtensionValue::Nested(children) => wire.extension = children,
        }
        wire
    }
}

/// URL-keyed extension collection
///
/// Entries sharing a URL are grouped at the position the URL was first seen.
/// Serializes as the plain FHIR array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionList {
    entries: IndexMap<String, Vec<Extension>>,
}

impl ExtensionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.get(url).is_some_and(|group| !group.is_empty())
    }

    /// First extension with this URL; nested arrays are searched when the top level has none.
    pub fn find(&self, url: &str) -> Option<&Extension> {
        if let Some(found) = self.entries.get(url).and_then(|group| group.first()) {
            return Some(found);
        }
        self.iter().find_map(|ext| find_extension(url, ext.nested()))
    }

    pub fn find_all(&self, url: &str) -> &[Extension] {
        self.entries.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_mut(&mut self, url: &str) -> Option<&mut Extension> {
        self.entries.get_mut(url).and_then(|group| group.first_mut())
    }

    /// Replace every entry with this URL by `extension`, keeping its position.
    pub fn upsert(&mut self, extension: Extension) {
        self.entries
            .insert(extension.url.clone(), vec![extension]);
    }

    /// Append `extension`; singleton URLs are upserted instead.
    pub fn push(&mut self, extension: Extension) {
        let singleton = extension
            .known_url()
            .is_some_and(|known| known.is_singleton());
        if singleton {
            self.upsert(extension);
        } else {
            self.entries
                .entry(extension.url.clone())
                .or_default()
                .push(extension);
        }
    }

    /// Remove all entries with this URL, returning them.
    pub fn remove(&mut self, url: &str) -> Vec<Extension> {
        self.entries.shift_remove(url).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.entries.values().flatten()
    }

    pub fn to_vec(&self) -> Vec<Extension> {
        self.iter().cloned().collect()
    }
}

impl FromIterator<Extension> for ExtensionList {
    fn from_iter<I: IntoIterator<Item = Extension>>(iter: I) -> Self {
        let mut list = ExtensionList::new();
        for ext in iter {
            list.push(ext);
        }
        list
    }
}

impl Serialize for ExtensionList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ExtensionList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let items = Vec::<Extension>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}
