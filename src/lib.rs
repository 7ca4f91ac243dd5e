// ============================================================================
// Cryptoverlay - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;      // API CoinGecko
pub mod app;      // État de l'application
pub mod models;   // Structures de données
pub mod settings; // Settings persistés
pub mod ui;       // Interface utilisateur
pub mod worker;   // Requêtes en arrière-plan
