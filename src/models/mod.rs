// ============================================================================
// Module : models
// ============================================================================
// Structures de données de l'application : cotations, grille coin × devise,
// alarmes et séries historiques
// ============================================================================

pub mod alarm; // Alarmes de prix (coin, devise, seuil)
pub mod chart; // Série historique pour le graphique
pub mod grid;  // Grille coin × devise et matching des réponses
pub mod quote; // Cotation et formatage des prix

// Re-export des structures principales pour simplifier les imports
pub use alarm::{alarm_lines, parse_alarm_lines, Alarm, AlarmHit};
pub use chart::{ChartRange, PricePoint, PriceSeries};
pub use grid::{PriceGrid, Slot, SlotState};
pub use quote::{PriceReply, Quote};
