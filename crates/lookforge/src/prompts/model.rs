use super::{with_extras, PromptOptions};
use crate::session::Side;

const FRONT_BODY: &str = "You are an e-commerce fashion photographer.

You will receive three images:
1. A front reference photo of the model. The person you generate must be this model: same face, \
build, skin tone and hair.
2. A flat-lay photo of a garment. Reproduce this exact garment with all of its details.
3. A pose reference. Copy its standing pose and posture.

Produce a product photo in which the model:
- Wears exactly the flat-lay garment: colour, fabric, texture, pattern, buttons, zips, seams, \
collar and sleeve length unchanged
- Takes the pose from the pose reference, facing the camera straight on
- Holds the arms slightly away from the body so the garment outline is clear
- Looks into the camera with a relaxed, confident expression

Photography:
- Plain white or light grey studio background
- Soft, even light without hard shadows
- Full body from head to below the knees
- Sharp garment detail
- Clean high-street e-commerce style

The garment must be a faithful copy of the flat-lay. Do not guess or change any part of it. The \
model must match the reference photo.";

const BACK_BODY: &str = "You are an e-commerce fashion photographer.

You will receive three images:
1. A back reference photo of the model. The person you generate must be this model seen from \
behind: same build, skin tone, hair and proportions.
2. A flat-lay photo of a garment. Reproduce this exact garment with all of its details.
3. A pose reference. Use a similar standing pose, seen from the back.

Produce a product photo in which the model:
- Wears exactly the flat-lay garment: colour, fabric, texture, pattern, back design and seams \
unchanged
- Stands with the back to the camera in a pose close to the pose reference
- Stands naturally; the head may turn slightly so the model is recognisable
- Lets the arms hang so the whole back of the garment is visible

Photography:
- Plain white or light grey studio background, matching the front view
- Soft, even light without hard shadows
- Full body from head to below the knees
- Sharp detail on the garment back
- Clean e-commerce style

The garment must be a faithful copy of the flat-lay. Do not guess or change any part of it. This \
is the back view of the same model in the same outfit.";

/// Model-wearing-garment prompt for one side.
pub fn model_prompt(side: Side, options: &PromptOptions<'_>) -> String {
    let body = match side {
        Side::Front => FRONT_BODY,
        Side::Back => BACK_BODY,
    };
    with_extras(body.to_string(), options)
}

/// Re-create one detail-page section from its reference, swapping in the
/// model photos.
pub fn detail_section_prompt(width: u32, options: &PromptOptions<'_>) -> String {
    let body = format!(
        "You are an e-commerce graphic designer.

You will receive:
1. A detail-page reference image. Its layout, style and design are the template to follow.
2. Photos of the model wearing the product. Use these as the product imagery.

Produce a new detail-page section that:
- Follows the reference layout, composition and visual style closely
- Replaces the model or product imagery in the reference with the photos provided
- Keeps the same background treatment, colour scheme and overall look
- Keeps the same proportions and spacing
- Is {width}px wide

Keep the design consistent with the reference. Only the model and product photos change."
    );
    with_extras(body, options)
}
