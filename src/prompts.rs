use serde::{Deserialize, Serialize};

/// The four campaign parameters a caller supplies with a creative. Lives for
/// one request only and is echoed back verbatim in the analysis response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub industry: String,
    pub platform: String,
    pub target_audience: String,
    pub goal: String,
}

/// Platform checklist table. Lookup is case-insensitive on the platform key;
/// anything outside the five known platforms gets the generic template with
/// the caller's platform string echoed into it.
pub fn platform_specific_checks(platform: &str) -> String {
    let checks: Option<&'static str> = match platform.to_lowercase().as_str() {
        "instagram" => Some(
            r#"
  - Square (1:1) or vertical (4:5) aspect ratio optimization
  - Text overlay doesn't exceed 20% of image (old rule, but still good practice)
  - Bright, vibrant colors (performs better in feed)
  - Face close-ups increase engagement by 38%
  - Video vs static consideration (Reels prioritization)
  - Story-safe zones (top/bottom cutoff areas)
  - Swipeable carousel optimization
  - Product tags placement"#,
        ),
        "facebook" => Some(
            r#"
  - Recommended image size: 1200x628px
  - Text-to-image ratio (avoid text-heavy designs)
  - Mobile feed optimization (90% of users on mobile)
  - Thumbnail effectiveness for video ads
  - Instant Experience (Canvas) compatibility
  - Multi-product catalog ad format
  - Lead form integration readiness
  - Community/group relevance"#,
        ),
        "tiktok" => Some(
            r#"
  - Vertical 9:16 aspect ratio (MUST for TikTok)
  - First 3 seconds hook strength
  - Sound-off viewing consideration (captions needed)
  - Native, organic look (overly polished ads perform worse)
  - Trend alignment (sounds, effects, transitions)
  - Creator-style authenticity
  - Fast-paced editing (attention span: 8 seconds)
  - Hashtag challenge potential"#,
        ),
        "linkedin" => Some(
            r#"
  - Professional, polished aesthetic
  - B2B value proposition clarity
  - Credibility indicators (stats, logos, certifications)
  - Desktop vs mobile optimization (more desktop usage than other platforms)
  - Thought leadership positioning
  - Corporate color schemes
  - Executive imagery appropriateness
  - Lead gen form compatibility
  - Document ad format consideration"#,
        ),
        "twitter" => Some(
            r#"
  - Landscape 16:9 or square 1:1 formats
  - High contrast for fast scrolling
  - Text brevity (complements tweet copy)
  - Trending topic relevance
  - Quote tweet screenshot consideration
  - Conversation starter potential
  - Poll integration opportunity
  - Real-time/timely content alignment"#,
        ),
        _ => None,
    };

    match checks {
        Some(text) => text.to_string(),
        None => format!(
            "\n  - Standard ad specifications for {platform}\n  - Platform-specific best practices\n  - Audience behavior patterns on {platform}\n  - Technical requirements and limitations"
        ),
    }
}

/// Build the full evaluation prompt for one creative. Pure function of the
/// context: no clock, no randomness, no network.
pub fn build_analysis_prompt(context: &AnalysisContext) -> String {
    let AnalysisContext {
        industry,
        platform,
        target_audience,
        goal,
    } = context;
    let platform_checks = platform_specific_checks(platform);

    format!(
        r#"You are a senior creative director analyzing advertising performance.

**ANALYZE THIS AD CREATIVE:**

## 1. FIRST IMPRESSION (3-Second Rule)
- ⏱️ **Scroll-Stop Power**: Will this stop someone mid-scroll? (1-10)
- 👁️ **Visual Hierarchy**: What catches the eye first, second, third?
- 🎯 **Message Clarity**: Can you understand the offer in 3 seconds?

## 2. DESIGN FUNDAMENTALS
- 🎨 **Color Psychology**:
  - Primary colors used and their emotional impact
  - Color contrast ratio (readability)
  - Does it match {industry} conventions or break them strategically?

- ✍️ **Typography**:
  - Font choices (modern, classic, bold, elegant?)
  - Readability at small sizes (mobile consideration)
  - Headline vs body text hierarchy
  - Is there too much or too little text?

- 📐 **Layout & Composition**:
  - Rule of thirds compliance
  - White space usage (breathing room)
  - Visual balance and symmetry
  - Focal point effectiveness

- 🖼️ **Imagery**:
  - Image quality and resolution
  - Authentic vs stock photo feel
  - Product/service visibility
  - Human faces (builds trust?)

## 3. MARKETING EFFECTIVENESS

- 💬 **Copy Impact**:
  - Headline strength (compelling? benefit-focused?)
  - Value proposition clarity
  - Pain point addressing
  - Feature vs benefit balance

- 🎯 **Call-to-Action**:
  - CTA visibility and prominence
  - Action verb strength ("Buy Now" vs "Get Started" vs "Learn More")
  - Urgency/scarcity elements
  - Multiple CTAs or single focus?

- 🧠 **Psychological Triggers**:
  - Social proof elements (testimonials, user count, ratings)
  - Scarcity ("Limited time", "Only X left")
  - Authority (credentials, certifications, awards)
  - Reciprocity (free trial, discount, bonus)
  - FOMO (fear of missing out)

## 4. PLATFORM OPTIMIZATION ({platform})

- 📱 **{platform} Best Practices**:
  {platform_checks}

- 🔧 **Technical Specs**:
  - Aspect ratio correctness
  - Safe zones for text (avoiding cutoff)
  - File size/load time considerations
  - Animated vs static appropriateness

## 5. AUDIENCE RESONANCE ({target_audience})

- 👥 **Target Audience Alignment**:
  - Visual style matches age group preferences
  - Language/tone appropriateness
  - Cultural sensitivity and inclusivity
  - Aspirational vs relatable balance

- 🌍 **Diversity & Inclusion**:
  - Representation in imagery
  - Accessible design (color blindness, dyslexia-friendly fonts)
  - Universal appeal vs niche targeting

## 6. COMPETITIVE POSITIONING

- 🏆 **Differentiation**:
  - Unique visual style vs category norms
  - Standing out vs fitting in
  - Memorable elements
  - Brand personality expression

- 📊 **Current Trends** (2025):
  - Minimalism vs maximalism trend
  - AI-generated imagery considerations
  - Authenticity movement alignment
  - Video-first world considerations (is static enough?)
  - User-generated content (UGC) style
  - Bold typography trends
  - Gradient and glassmorphism usage

## 7. CONVERSION POTENTIAL (Goal: {goal})

- 💰 **Estimated Performance Metrics**:
  - **CTR Prediction**: X% (based on design quality)
  - **Engagement Rate**: Expected likes/shares/comments
  - **Conversion Potential**: Low/Medium/High
  - **A/B Test Priority**: Which element to test first

- ⚠️ **Red Flags**:
  - Anything that might hurt performance
  - Legal/compliance concerns (health claims, etc.)
  - Brand safety issues

## 8. ACTIONABLE RECOMMENDATIONS

Provide 3 tiers of improvements:

**🚀 Quick Wins** (can implement in <1 hour):
- Example: Increase CTA button size by 20%
- Example: Change headline to benefit-focused

**💡 Medium Impact** (1-3 hours of work):
- Example: Replace stock photo with authentic imagery
- Example: Adjust color scheme for better contrast

**🎯 Major Overhaul** (if needed):
- Example: Complete layout restructure
- Example: Different creative concept

## 9. COMPETITIVE COMPARISON

How does this compare to typical {industry} ads on {platform}?
- Better/Worse/Average
- What are competitors doing differently?
- Gaps in the market this could fill

## 10. FINAL VERDICT

- **Overall Score**: X/10
- **Would I approve this ad?**: Yes/No and why
- **Predicted Performance**: Top 10% / Top 25% / Average / Below Average
- **One-Sentence Summary**: [Your summary here]

Format your response with clear headings, use emojis for scannability, and be brutally honest but constructive."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(platform: &str) -> AnalysisContext {
        AnalysisContext {
            industry: "fashion".to_string(),
            platform: platform.to_string(),
            target_audience: "gen z".to_string(),
            goal: "brand awareness".to_string(),
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let ctx = context("instagram");
        assert_eq!(build_analysis_prompt(&ctx), build_analysis_prompt(&ctx));
    }

    #[test]
    fn platform_lookup_is_case_insensitive() {
        let lower = platform_specific_checks("instagram");
        assert_eq!(platform_specific_checks("Instagram"), lower);
        assert_eq!(platform_specific_checks("INSTAGRAM"), lower);
        assert!(lower.contains("Face close-ups increase engagement"));
    }

    #[test]
    fn unknown_platform_falls_back_to_generic_template() {
        let checks = platform_specific_checks("pinterest");
        assert_eq!(checks.matches("pinterest").count(), 2);
        assert!(checks.contains("Standard ad specifications for pinterest"));
        assert!(checks.contains("Audience behavior patterns on pinterest"));
    }

    #[test]
    fn interpolations_preserve_caller_casing() {
        let ctx = context("LinkedIn");
        let prompt = build_analysis_prompt(&ctx);
        assert!(prompt.contains("## 4. PLATFORM OPTIMIZATION (LinkedIn)"));
        assert!(prompt.contains("**LinkedIn Best Practices**"));
        // The checklist itself still resolves through the lower-cased key.
        assert!(prompt.contains("B2B value proposition clarity"));
        assert!(prompt.contains("AUDIENCE RESONANCE (gen z)"));
        assert!(prompt.contains("Goal: brand awareness"));
        assert!(prompt.contains("typical fashion ads on LinkedIn"));
    }

    #[test]
    fn all_five_platforms_have_checklists() {
        for platform in ["instagram", "facebook", "tiktok", "linkedin", "twitter"] {
            let checks = platform_specific_checks(platform);
            assert!(
                !checks.contains("Standard ad specifications"),
                "{platform} unexpectedly hit the fallback"
            );
        }
    }
}
