//! Data models matching the AmbuConnect backend wire contract.
//!
//! Field names follow the backend's JSON (French domain vocabulary,
//! camelCase on the wire). These types are shared by the REST client and
//! the realtime channel: a realtime frame is a JSON-encoded [`Message`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response envelope the backend wraps around every REST payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// --- Messaging ---

/// Category of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Notification,
    Information,
    Urgent,
    Discussion,
}

/// A message in a facility's chat stream, optionally tied to a transport
/// request (demande). Created server-side; `id` and `date_creation` are
/// server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub etablissement_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demande_id: Option<String>,
    pub expediteur_id: String,
    pub expediteur_nom: String,
    pub expediteur_role: String,
    #[serde(rename = "type")]
    pub r#type: MessageType,
    pub contenu: String,
    pub lu: bool,
    pub date_creation: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,
}

/// Payload for `POST /etablissements/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demande_id: Option<String>,
    #[serde(rename = "type")]
    pub r#type: MessageType,
    pub contenu: String,
}

// --- Etablissements ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeEtablissement {
    Hopital,
    Clinique,
    Ehpad,
    CabinetMedical,
    CentreReeducation,
}

/// A healthcare facility. Scopes the realtime channel and its messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Etablissement {
    pub id: String,
    pub nom: String,
    pub type_etablissement: TypeEtablissement,
    pub adresse: String,
    pub ville: String,
    pub code_postal: String,
    pub email_contact: String,
    pub telephone_contact: String,
    pub responsable_referent_id: String,
    pub siret: String,
    pub actif: bool,
    pub date_creation: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateEtablissement {
    pub nom: String,
    pub type_etablissement: TypeEtablissement,
    pub adresse: String,
    pub email_contact: String,
    pub telephone_contact: String,
    pub responsable_referent_id: String,
}

/// Partial update; only the provided fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEtablissement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_etablissement: Option<TypeEtablissement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adresse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsable_referent_id: Option<String>,
}

/// Activity statistics for a facility over a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EtablissementStats {
    pub nombre_transports: u64,
    pub nombre_patients_uniques: u64,
    pub taux_satisfaction: f64,
    pub temps_attente_moyen: f64,
}

// --- Utilisateurs ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleUtilisateur {
    Admin,
    Responsable,
    Operateur,
    Regulateur,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Utilisateur {
    pub id: String,
    pub email: String,
    pub nom: String,
    pub prenom: String,
    pub role: RoleUtilisateur,
    pub telephone: String,
    pub etablissement_id: String,
    pub actif: bool,
    pub date_creation: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUtilisateur {
    pub email: String,
    pub nom: String,
    pub prenom: String,
    pub role: RoleUtilisateur,
    pub telephone: String,
    pub mot_de_passe: String,
}

// --- Demandes de transport ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeTransport {
    Assis,
    Couche,
    Medicalise,
    Bariatrique,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatutDemande {
    EnAttente,
    Acceptee,
    EnCours,
    Terminee,
    Annulee,
}

/// A patient transport request raised by a facility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DemandeTransport {
    pub id: String,
    pub etablissement_id: String,
    pub patient_id: String,
    pub adresse_depart: String,
    pub adresse_arrivee: String,
    pub horaire_souhaite: DateTime<Utc>,
    pub type_transport: TypeTransport,
    pub statut: StatutDemande,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentaire: Option<String>,
    pub date_creation: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateDemandeTransport {
    pub patient_id: String,
    pub adresse_depart: String,
    pub adresse_arrivee: String,
    pub horaire_souhaite: DateTime<Utc>,
    pub type_transport: TypeTransport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDemandeStatut {
    pub statut: StatutDemande,
}

/// Query filters for listing a facility's transport requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiltresDemandes {
    pub statut: Option<StatutDemande>,
    pub debut: Option<DateTime<Utc>>,
    pub fin: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_deserializes_backend_frame() {
        let json = r#"{
            "id": "m1",
            "etablissementId": "fac-1",
            "expediteurId": "u1",
            "expediteurNom": "Alice",
            "expediteurRole": "OPERATEUR",
            "type": "DISCUSSION",
            "contenu": "hi",
            "lu": false,
            "dateCreation": "2025-01-01T00:00:00Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.etablissement_id, "fac-1");
        assert_eq!(msg.demande_id, None);
        assert_eq!(msg.expediteur_nom, "Alice");
        assert_eq!(msg.r#type, MessageType::Discussion);
        assert_eq!(msg.contenu, "hi");
        assert!(!msg.lu);
        assert_eq!(msg.date_modification, None);
    }

    #[test]
    fn message_roundtrips_optional_fields() {
        let json = r#"{
            "id": "m2",
            "etablissementId": "fac-1",
            "demandeId": "d1",
            "expediteurId": "u2",
            "expediteurNom": "Bob",
            "expediteurRole": "ADMIN",
            "type": "URGENT",
            "contenu": "patient ready",
            "lu": true,
            "dateCreation": "2025-01-01T12:00:00Z",
            "dateModification": "2025-01-01T12:05:00Z"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.demande_id.as_deref(), Some("d1"));

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["demandeId"], "d1");
        assert_eq!(back["type"], "URGENT");
    }

    #[test]
    fn enums_use_backend_wire_names() {
        assert_eq!(
            serde_json::to_string(&MessageType::Notification).unwrap(),
            "\"NOTIFICATION\""
        );
        assert_eq!(
            serde_json::to_string(&TypeEtablissement::CabinetMedical).unwrap(),
            "\"CABINET_MEDICAL\""
        );
        assert_eq!(
            serde_json::to_string(&StatutDemande::EnAttente).unwrap(),
            "\"EN_ATTENTE\""
        );
        assert_eq!(
            serde_json::to_string(&TypeTransport::Medicalise).unwrap(),
            "\"MEDICALISE\""
        );
    }

    #[test]
    fn create_message_omits_absent_demande_id() {
        let dto = CreateMessage {
            demande_id: None,
            r#type: MessageType::Discussion,
            contenu: "hello".into(),
        };
        let v = serde_json::to_value(&dto).unwrap();
        assert!(v.get("demandeId").is_none());
        assert_eq!(v["type"], "DISCUSSION");
        assert_eq!(v["contenu"], "hello");
    }
}
