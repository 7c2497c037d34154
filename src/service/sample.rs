use serde_json::{Value, json};

/// Built-in, clearly fictional news dataset served when neither the provider nor
/// the cache can answer. Every item links to `example.com`.
pub fn sample_news() -> Value {
    json!({
        "items": [
            {
                "title": "Tech Stocks Rally as AI Revolution Continues",
                "url": "https://example.com/news1",
                "time_published": "20241201T143000",
                "authors": ["Financial Reporter"],
                "summary": "Major technology stocks surge as artificial intelligence adoption accelerates across industries, with investors showing renewed confidence in the sector.",
                "banner_image": null,
                "source": "Financial News Network",
                "category_within_source": "Technology",
                "source_domain": "financialnews.com",
                "topics": [{"topic": "Technology", "relevance_score": "0.8"}],
                "overall_sentiment_score": 0.7,
                "overall_sentiment_label": "Bullish",
                "ticker_sentiment": [{
                    "ticker": "AAPL",
                    "relevance_score": "0.9",
                    "ticker_sentiment_score": "0.8",
                    "ticker_sentiment_label": "Bullish"
                }]
            },
            {
                "title": "Federal Reserve Signals Potential Rate Changes",
                "url": "https://example.com/news2",
                "time_published": "20241201T120000",
                "authors": ["Economic Analyst"],
                "summary": "The Federal Reserve indicates possible adjustments to interest rates in response to changing economic conditions and inflation targets.",
                "banner_image": null,
                "source": "Economic Times",
                "category_within_source": "Economics",
                "source_domain": "economictimes.com",
                "topics": [{"topic": "Economy - Monetary Policy", "relevance_score": "0.9"}],
                "overall_sentiment_score": 0.1,
                "overall_sentiment_label": "Neutral",
                "ticker_sentiment": []
            },
            {
                "title": "Electric Vehicle Market Shows Strong Growth",
                "url": "https://example.com/news3",
                "time_published": "20241201T100000",
                "authors": ["Auto Industry Reporter"],
                "summary": "Electric vehicle manufacturers report record sales figures as consumer adoption accelerates and charging infrastructure expands nationwide.",
                "banner_image": null,
                "source": "Auto News Daily",
                "category_within_source": "Automotive",
                "source_domain": "autonews.com",
                "topics": [{"topic": "Energy & Transportation", "relevance_score": "0.85"}],
                "overall_sentiment_score": 0.6,
                "overall_sentiment_label": "Bullish",
                "ticker_sentiment": [{
                    "ticker": "TSLA",
                    "relevance_score": "0.8",
                    "ticker_sentiment_score": "0.7",
                    "ticker_sentiment_label": "Bullish"
                }]
            },
            {
                "title": "Healthcare Sector Sees Major Breakthrough",
                "url": "https://example.com/news4",
                "time_published": "20241130T180000",
                "authors": ["Health Reporter"],
                "summary": "Pharmaceutical companies announce significant advances in drug development, leading to positive market reactions and increased investor interest.",
                "banner_image": null,
                "source": "Health Business Journal",
                "category_within_source": "Healthcare",
                "source_domain": "healthbiz.com",
                "topics": [{"topic": "Life Sciences", "relevance_score": "0.9"}],
                "overall_sentiment_score": 0.8,
                "overall_sentiment_label": "Bullish",
                "ticker_sentiment": [{
                    "ticker": "JNJ",
                    "relevance_score": "0.7",
                    "ticker_sentiment_score": "0.6",
                    "ticker_sentiment_label": "Bullish"
                }]
            }
        ],
        "sentiment_score_definition": "x <= -0.35: Bearish; -0.35 < x <= -0.15: Somewhat-Bearish; -0.15 < x < 0.15: Neutral; 0.15 <= x < 0.35: Somewhat-Bullish; x >= 0.35: Bullish"
    })
}
