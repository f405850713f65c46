//! Centralized prompt definitions for mentor tasks
//!
//! Prompts are built here so the task definitions only deal with request shaping and
//! output normalization.

/// Closing instruction for structured tasks.
const JSON_ONLY: &str = "Respond with valid JSON only, no explanation.";

/// Mentoring tip for one cooking step.
pub fn step_tip(step_instruction: &str) -> String {
    format!(
        r#"You are a professional chef mentor.
The user is on this step: "{step_instruction}".

Give one short, encouraging tip (max 20 words) to help them succeed at this specific step.
Focus on technique or sensory cues (smell, look).
Do not repeat the instruction."#
    )
}

/// Voice command classification.
pub fn voice_intent(text: &str) -> String {
    format!(
        r#"User said: "{text}"

Classify into one of these intents:
- NEXT (go to next step)
- PREV (go back)
- REPEAT (repeat instruction)
- TIMER (set a timer)
- PAUSE (pause cooking)
- RESUME (resume cooking)
- INGREDIENT (asking about ingredients)
- HELP (asking for help or available commands)
- UNKNOWN (none of above)

Return a JSON object like:
{{"intent": "TIMER", "duration_seconds": 600}}
or
{{"intent": "NEXT"}}

{JSON_ONLY}"#
    )
}

/// Food safety review of an instruction.
pub fn food_safety(instruction: &str) -> String {
    format!(
        r#"You are a food safety expert. Check this cooking instruction for safety:
"{instruction}"

Return JSON: {{"safe": true/false, "warnings": ["list of warnings if unsafe"]}}
If safe, return: {{"safe": true, "warnings": []}}
Only flag genuine dangers (undercooked meat, cross-contamination, allergens).
{JSON_ONLY}"#
    )
}

const DIAGNOSIS_FORMAT: &str = r#"1. Diagnose the root cause of the failure (e.g., burnt, undercooked, broken sauce, curdled).
2. Explain WHY it happened in 2-3 sentences, considering any context provided.
3. Provide 3 specific, actionable tips to fix it next time.
4. Rate the severity: minor (easily fixable), moderate, or major (need to restart).

Format your response as valid JSON:
{
    "root_cause": "brief diagnosis",
    "explanation": "detailed why it happened",
    "tips": ["tip 1", "tip 2", "tip 3"],
    "severity": "minor|moderate|major",
    "confidence": 0.85
}"#;

/// Failure diagnosis for a model that receives the photo.
pub fn diagnosis_with_image(context_text: &str) -> String {
    format!("Look at this failed dish.{context_text}\n\n{DIAGNOSIS_FORMAT}")
}

/// Failure diagnosis for a model that only sees the cook's context.
pub fn diagnosis_from_context(context_text: &str) -> String {
    format!(
        "A user uploaded an image of a failed cooking dish.{context_text}\n\n\
         Based on the context clues provided, diagnose what likely went wrong.\n\
         Since you cannot see the image, use the context to make educated guesses.\n\n\
         {DIAGNOSIS_FORMAT}"
    )
}

/// Conversational mentor reply.
pub fn mentor_chat(transcript: &str, context_text: &str) -> String {
    format!(
        "You are ChefMentor, a friendly professional chef guiding a home cook in real time.\n\
         Keep answers under 60 words, practical and encouraging.{context_text}\n\n\
         Conversation so far:\n{transcript}\n\nReply as the mentor:"
    )
}

/// Progress check on a live camera frame.
pub fn live_feedback(recipe_name: &str, step_number: u32, step_instruction: &str) -> String {
    format!(
        r#"You are watching a home cook make "{recipe_name}" through their camera.
They are on step {step_number}: "{step_instruction}".

Judge from the photo whether they are on track for this step.
Return JSON: {{"feedback": "one or two sentences", "is_on_track": true/false, "suggestions": ["short suggestion"]}}
{JSON_ONLY}"#
    )
}
