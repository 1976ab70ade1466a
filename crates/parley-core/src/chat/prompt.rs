//! System prompt template.

use parley_types::persona::Persona;

/// Build the system prompt for a persona.
///
/// Name and description are interpolated verbatim.
pub fn build_system_prompt(persona: &Persona) -> String {
    format!(
        "You are an AI assistant named {}. Your persona is described as: {}. \
         Please respond to the user's message in character.",
        persona.name, persona.description
    )
}
