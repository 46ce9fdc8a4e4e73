use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::access::AccessError;
use super::sequence::StepSequence;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for organizational sectors ("RH", "Médico", ...).
    SectorId
);
string_id!(
    /// Identifier of one candidate's admission instance.
    InstanceId
);
string_id!(
    /// Identifier of an admission batch.
    BatchId
);
string_id!(TemplateId);
string_id!(StepId);
string_id!(ActorId);
string_id!(CandidateId);
string_id!(FieldId);
string_id!(AccessProfileId);

/// Named organizational unit that owns workflow steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Dashboard sections an access profile can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Dashboard,
    Workflow,
    Forms,
    Admissions,
    Jobs,
    Candidates,
    Sectors,
    Users,
    AccessProfiles,
    Reports,
}

impl Section {
    /// Sections in menu order.
    pub const fn ordered() -> [Self; 10] {
        [
            Self::Dashboard,
            Self::Workflow,
            Self::Forms,
            Self::Admissions,
            Self::Jobs,
            Self::Candidates,
            Self::Sectors,
            Self::Users,
            Self::AccessProfiles,
            Self::Reports,
        ]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Workflow => "workflow",
            Self::Forms => "forms",
            Self::Admissions => "admissions",
            Self::Jobs => "jobs",
            Self::Candidates => "candidates",
            Self::Sectors => "sectors",
            Self::Users => "users",
            Self::AccessProfiles => "access-profiles",
            Self::Reports => "reports",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Workflow => "Fluxos de Etapas",
            Self::Forms => "Formulários",
            Self::Admissions => "Admissões",
            Self::Jobs => "Publicar Vagas",
            Self::Candidates => "Candidatos",
            Self::Sectors => "Setores",
            Self::Users => "Usuários",
            Self::AccessProfiles => "Perfil de Acesso",
            Self::Reports => "Relatórios",
        }
    }
}

impl FromStr for Section {
    type Err = AccessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ordered()
            .into_iter()
            .find(|section| section.id() == trimmed)
            .ok_or_else(|| AccessError::UnknownSection(trimmed.to_string()))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Parse loosely typed permission identifiers, rejecting anything unknown.
pub fn parse_permissions<I, S>(raw: I) -> Result<BTreeSet<Section>, AccessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|value| value.as_ref().parse::<Section>())
        .collect()
}

/// Named permission set assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessProfile {
    pub id: AccessProfileId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permissions: BTreeSet<Section>,
}

impl AccessProfile {
    pub fn duplicate(&self, id: AccessProfileId) -> Self {
        Self {
            id,
            name: format!("{} (Cópia)", self.name),
            description: self.description.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    SectorUser,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SectorUser => "sector_user",
        }
    }
}

/// Authenticated user as handed over by the authentication collaborator.
///
/// `unrestricted` is decided at sign-in (master sector admins) and bypasses
/// both section and record filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub sector: SectorId,
    pub role: ActorRole,
    #[serde(default)]
    pub permissions: BTreeSet<Section>,
    #[serde(default)]
    pub unrestricted: bool,
}

impl Actor {
    pub fn with_profile(
        id: ActorId,
        name: impl Into<String>,
        sector: SectorId,
        role: ActorRole,
        profile: &AccessProfile,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            sector,
            role,
            permissions: profile.permissions.clone(),
            unrestricted: false,
        }
    }

    pub fn unrestricted(mut self) -> Self {
        self.unrestricted = true;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    File,
    Select,
    Checkbox,
    Signature,
}

/// Intake form field; rendering and editing belong to the form builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub id: FieldId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Template an admission batch is created from: intake fields plus the
/// ordered sector checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
    pub steps: StepSequence,
}

/// Captured answer stored verbatim on the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormResponse {
    pub field_id: FieldId,
    pub value: FormValue,
}

/// Candidate record handed over by the candidates collaborator at enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: CandidateId,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub job_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub form_responses: Vec<FormResponse>,
}

/// Identity fields copied onto an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub candidate_id: CandidateId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionStatus {
    InProgress,
    Completed,
    Rejected,
}

impl AdmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
