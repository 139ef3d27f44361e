use super::{with_extras, PromptOptions};

const ATTRIBUTES: &str =
    "colour, fabric, texture, pattern, buttons, zips, seams, collar, sleeve length, fit and drape";

/// How the attached material photos are introduced, given how many there are.
fn material_lines(count: usize, what: &str, attributes: &str) -> (String, String) {
    let count = count.max(1);
    if count == 1 {
        (
            format!(
                "2. A real-world photo of the {what}. Take the garment from this photo exactly as it is."
            ),
            format!("- Reproduce every garment detail from the source: {attributes}"),
        )
    } else {
        (
            format!(
                "2-{}. {} real-world photos of the same {what} from different angles. Study all of \
                 them together to recover the exact garment.",
                count + 1,
                count
            ),
            format!(
                "- Merge what all {count} source photos show to reproduce every garment detail: \
                 {attributes}\n- Where one angle is unclear, use the others to decide"
            ),
        )
    }
}

/// Put the garment from the material photos onto the model in the subject
/// photo, keeping everything else about the subject photo.
pub fn retouch_prompt(options: &PromptOptions<'_>) -> String {
    let count = options.material_count.max(1);
    let (intro, detail) = material_lines(count, "clothing being worn (SOURCE CLOTHING)", ATTRIBUTES);

    let body = format!(
        "You are an e-commerce fashion retoucher.

You will receive {total} images:
1. A finished model photo. This is the TARGET: keep the model's face, expression, body, skin, \
hair, pose, background, lighting and framing.
{intro}

Produce one photo in which:
- The output has the same width and height as image 1
- The model, pose, background, lighting and composition match image 1 exactly
- Only the clothing changes, replaced by the garment from the source photo(s)
- Nothing but the garment is taken from the source photo(s): ignore their background, person, \
pose and lighting
{detail}
- The new garment sits naturally on the body and follows the original pose
- Light and shadow on the garment match the scene
- The result reads as a real studio photo, not a composite

Do not alter the face, hair, skin, pose or background. Do not invent or drop garment details.",
        total = count + 1,
    );

    with_extras(body, options)
}

/// Replace only the fabric in a close-up detail photo, keeping its framing.
pub fn clothing_detail_prompt(options: &PromptOptions<'_>) -> String {
    let count = options.material_count.max(1);
    let attributes = format!("{ATTRIBUTES}, weave");
    let (intro, detail) = material_lines(count, "NEW clothing (SOURCE CLOTHING)", &attributes);

    let body = format!(
        "You are an e-commerce product detail photographer.

You will receive {total} images:
1. A detail reference photo. This is the COMPOSITION: keep its camera angle, crop, background, \
lighting, props, any hands, and layout. It fixes the output size.
{intro}

Produce one detail photo in which:
- The output has the same width and height as image 1
- Angle, crop and layout are identical to image 1
- Background, lighting, shadows and mood are identical to image 1
- Hands, fingers, props, mannequin parts and other non-garment elements stay exactly as they are
- Only the garment or fabric area is replaced with the garment from the source photo(s)
- Nothing but the garment is taken from the source photo(s)
{detail}
- The new fabric follows the original folds, drape and placement
- Light and shadow on the fabric match the scene
- The result reads as a real detail shot, not a composite

Do not change composition, angle, background, lighting or anything that is not garment. Do not \
invent or drop garment details.",
        total = count + 1,
    );

    with_extras(body, options)
}
