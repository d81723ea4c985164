/// Port registry for the legacy tide feed.
///
/// The legacy IHM feed is addressed by port code only, and publishes no
/// directory of its own. This is the canonical list of codes requested
/// from it. The API feed fetches its directory instead (see
/// `ingest::ihm::parse_port_directory`).

use crate::model::Port;

/// Port codes served by the legacy feed, in alphabetical order.
pub static PORT_REGISTRY: &[&str] = &[
    "aguarda",
    "algeciras",
    "arinaga",
    "arrecife",
    "aviles",
    "ayamonte",
    "baiona",
    "barbate",
    "bilbao",
    "bonanza",
    "burela",
    "cadiz",
    "camarinas",
    "carino",
    "cedeira",
    "ceuta",
    "chipiona",
    "cillero",
    "conil",
    "coruna",
    "cudillero",
    "elpuertosantamaria",
    "ferrol",
    "fisterra",
    "foz",
    "gallineras",
    "gijon",
    "granadilla",
    "islacanela",
    "islacristina",
    "lacarraca",
    "langosteira",
    "lisboa",
    "llanes",
    "loscristianos",
    "losgigantes",
    "malpica",
    "marin",
    "mazagon",
    "morrojable",
    "navia",
    "pasajes",
    "pasitoblanco",
    "portosin",
    "ptocruz",
    "ptolaestaca",
    "ptolaluz",
    "ptolasnieves",
    "ptorosario",
    "puntaumbria",
    "ribadeo",
    "ribadesella",
    "rota",
    "sada",
    "sancibrao",
    "sanctipetri",
    "sansebastiangomera",
    "santander",
    "santauxia",
    "sanxenxo",
    "sevilla",
    "sotogrande",
    "stacruzpalma",
    "stacruztenerife",
    "tanger",
    "tapia",
    "tarifa",
    "vigo",
    "vilagarcia",
];

/// Returns the registry as ports known only by their code.
pub fn legacy_ports() -> Vec<Port> {
    PORT_REGISTRY.iter().map(|code| Port::from_code(code)).collect()
}

/// Looks up a port by code. Returns `None` if not in the registry.
pub fn find_port(code: &str) -> Option<Port> {
    PORT_REGISTRY
        .iter()
        .find(|c| **c == code)
        .map(|c| Port::from_code(c))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
